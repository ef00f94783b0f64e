use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::actions::{self, ActionBar, DiscardRequest};
use crate::auth::{Account, AuthService, AuthUser, Dashboard, Role, RoleGuard};
use crate::browser::{GalleryView, Thumbnails};
use crate::config::AppConfig;
use crate::gallery::{Collection, Gallery, Selection};
use crate::inbox::{ActionKind, CustomerInbox, InboxStatus, InboxStore, JsonInboxStore, PhotoKind};
use crate::thumbnail::SUPPORTED_IMAGE_EXTS;
use crate::upload;

const FORM_WIDTH: f32 = 280.0;
const SMALL_THUMB: f32 = 64.0;

struct Session {
    token: String,
    user: AuthUser,
}

#[derive(Default)]
struct AuthForm {
    email: String,
    password: String,
    confirm: String,
    error: Option<String>,
}

/// The customer's inbox: both galleries over one shared selection.
struct InboxScreen {
    customer_id: String,
    email: String,
    deadline: String,
    pending: usize,
    packages: GalleryView,
    letters: GalleryView,
    selection: Selection,
    actions: ActionBar,
    status: Option<String>,
}

impl InboxScreen {
    fn new(user: &AuthUser, inbox: CustomerInbox, long_press: Duration) -> Self {
        let pending = inbox.pending_requests().count();
        let gallery = |kind: PhotoKind, items| {
            GalleryView::new(
                (kind.label(), &user.user_id),
                kind.label(),
                Gallery::new(Collection::new(kind.pairing(), items), long_press),
            )
        };
        Self {
            customer_id: user.user_id.clone(),
            email: user.email.clone(),
            deadline: inbox.deadline,
            pending,
            packages: gallery(PhotoKind::Packages, inbox.packages),
            letters: gallery(PhotoKind::Letters, inbox.letters),
            selection: Selection::default(),
            actions: ActionBar::default(),
            status: None,
        }
    }

    /// Swaps in freshly stored photos. The selection is dropped since its ids
    /// may no longer exist.
    fn reload(&mut self, inbox: CustomerInbox) {
        self.pending = inbox.pending_requests().count();
        self.deadline = inbox.deadline;
        self.packages.set_items(inbox.packages);
        self.letters.set_items(inbox.letters);
        self.selection.clear();
        self.actions.sync(&self.selection);
    }

    fn collections(&self) -> [&Collection; 2] {
        [
            self.packages.gallery().collection(),
            self.letters.gallery().collection(),
        ]
    }
}

/// Confirmation for a discard, reached through its query string.
struct DiscardScreen {
    inbox: Box<InboxScreen>,
    request: DiscardRequest,
}

impl DiscardScreen {
    fn new(inbox: Box<InboxScreen>, query: &str) -> Self {
        let request = DiscardRequest::from_query(query, &inbox.collections());
        Self { inbox, request }
    }
}

#[derive(Default)]
struct AdminScreen {
    loaded: bool,
    customers: Vec<Account>,
    selected: Option<String>,
    inbox: Option<CustomerInbox>,
    deadline: String,
    dashboard: Option<Dashboard>,
    status: Option<String>,
}

enum AdminAction {
    Refresh,
    Select(String),
    SaveDeadline,
    Upload(PhotoKind),
    Remove(PhotoKind, String),
    Complete(String),
}

enum Screen {
    Login,
    Signup,
    Inbox(Box<InboxScreen>),
    Discard(Box<DiscardScreen>),
    Admin(Box<AdminScreen>),
}

pub struct MailroomApp {
    config: AppConfig,
    data_dir: PathBuf,
    auth: Result<AuthService, String>,
    store: JsonInboxStore,
    thumbs: Thumbnails,
    session: Option<Session>,
    screen: Screen,
    form: AuthForm,
}

impl MailroomApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let data_dir = config.data_dir();
        let auth = AuthService::open(&data_dir, &config.admin_emails, config.token_ttl_hours())
            .map_err(|e| {
                error!("Could not open account store: {e}");
                format!("Could not open account store: {e}")
            });
        let store = JsonInboxStore::new(&data_dir).with_default_deadline(config.default_deadline());
        info!("Inbox data in {}", store.path().display());
        let thumbs = Thumbnails::new(config.cache_dir());
        let form = AuthForm {
            email: config.last_email.clone().unwrap_or_default(),
            ..AuthForm::default()
        };
        Self {
            config,
            data_dir,
            auth,
            store,
            thumbs,
            session: None,
            screen: Screen::Login,
            form,
        }
    }

    fn auth(&self) -> Result<&AuthService, String> {
        self.auth.as_ref().map_err(Clone::clone)
    }

    fn login(&mut self) -> Result<Screen, String> {
        let response = self
            .auth()?
            .login(&self.form.email, &self.form.password, Utc::now())
            .map_err(|e| e.to_string())?;
        self.start_session(response.access_token)
    }

    fn signup(&mut self) -> Result<Screen, String> {
        if self.form.password != self.form.confirm {
            return Err("Passwords do not match".to_string());
        }
        let response = self
            .auth()?
            .signup(&self.form.email, &self.form.password, Utc::now())
            .map_err(|e| e.to_string())?;
        self.start_session(response.access_token)
    }

    fn start_session(&mut self, token: String) -> Result<Screen, String> {
        let auth = self.auth()?;
        let user = auth
            .authenticate(&token, Utc::now())
            .map(|user| auth.profile(&user))
            .map_err(|e| e.to_string())?;
        info!(user = %user.user_id, role = ?user.role, "signed in");
        self.config.last_email = Some(user.email.clone());
        self.form = AuthForm {
            email: user.email.clone(),
            ..AuthForm::default()
        };
        let screen = match user.role {
            Role::Admin => Screen::Admin(Box::default()),
            Role::User => Screen::Inbox(Box::new(InboxScreen::new(
                &user,
                self.store.inbox(&user.user_id),
                self.config.long_press(),
            ))),
        };
        self.session = Some(Session { token, user });
        Ok(screen)
    }

    fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            info!(user = %session.user.user_id, "signed out");
        }
        self.screen = Screen::Login;
    }

    fn top_bar(&mut self, ctx: &egui::Context) {
        let mut sign_out = false;
        egui::TopBottomPanel::top("main_menu").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Mailroom");
                if let Some(session) = &self.session {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Sign out").clicked() {
                            sign_out = true;
                        }
                        let role = match session.user.role {
                            Role::Admin => " (admin)",
                            Role::User => "",
                        };
                        ui.label(format!("{}{}", session.user.email, role));
                    });
                }
            });
        });
        if sign_out {
            self.sign_out();
        }
    }

    fn show_login(&mut self, ctx: &egui::Context) -> Screen {
        let mut next = Screen::Login;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.set_max_width(FORM_WIDTH);
                ui.add_space(48.0);
                ui.heading("Sign in");
                ui.add_space(12.0);
                ui.add(egui::TextEdit::singleline(&mut self.form.email).hint_text("Email"));
                let password = ui.add(
                    egui::TextEdit::singleline(&mut self.form.password)
                        .password(true)
                        .hint_text("Password"),
                );
                show_form_error(ui, self.form.error.as_deref());
                ui.add_space(8.0);
                let submitted = ui.button("Sign in").clicked()
                    || (password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)));
                if submitted {
                    match self.login() {
                        Ok(screen) => next = screen,
                        Err(msg) => self.form.error = Some(msg),
                    }
                }
                ui.add_space(8.0);
                if ui.link("Create an account").clicked() {
                    self.form.error = None;
                    next = Screen::Signup;
                }
            });
        });
        next
    }

    fn show_signup(&mut self, ctx: &egui::Context) -> Screen {
        let mut next = Screen::Signup;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.set_max_width(FORM_WIDTH);
                ui.add_space(48.0);
                ui.heading("Create an account");
                ui.add_space(12.0);
                ui.add(egui::TextEdit::singleline(&mut self.form.email).hint_text("Email"));
                ui.add(
                    egui::TextEdit::singleline(&mut self.form.password)
                        .password(true)
                        .hint_text("Password (8+ characters)"),
                );
                ui.add(
                    egui::TextEdit::singleline(&mut self.form.confirm)
                        .password(true)
                        .hint_text("Confirm password"),
                );
                show_form_error(ui, self.form.error.as_deref());
                ui.add_space(8.0);
                if ui.button("Sign up").clicked() {
                    match self.signup() {
                        Ok(screen) => next = screen,
                        Err(msg) => self.form.error = Some(msg),
                    }
                }
                ui.add_space(8.0);
                if ui.link("Already have an account? Sign in").clicked() {
                    self.form.error = None;
                    next = Screen::Login;
                }
            });
        });
        next
    }

    fn show_inbox(&mut self, ctx: &egui::Context, mut s: Box<InboxScreen>) -> Screen {
        let mut discard_query = None;
        let mut submit = None;
        let mut refresh = false;

        egui::TopBottomPanel::top("inbox_actions").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for kind in ActionKind::ALL {
                    let active = s.actions.active() == Some(kind);
                    if ui.selectable_label(active, kind.label()).clicked() {
                        s.actions.activate(kind, &mut s.selection);
                    }
                }
                ui.separator();
                ui.label(format!("Pick-up deadline: {}", s.deadline));
                if s.pending > 0 {
                    ui.label(
                        egui::RichText::new(format!("{} request(s) in progress", s.pending)).weak(),
                    );
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(egui::RichText::new(&s.email).weak());
                    if ui.button("Refresh").clicked() {
                        refresh = true;
                    }
                });
            });
            if let Some(status) = &s.status {
                ui.label(status);
            }
        });

        egui::TopBottomPanel::bottom("inbox_selection").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let count = s.selection.unit_count(&s.collections());
                ui.label(format!("{count} selected"))
                    .on_hover_text(format!("{} photo(s)", s.selection.len()));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let can_continue = s.actions.can_continue(&s.selection);
                    if ui
                        .add_enabled(can_continue, egui::Button::new("Next"))
                        .clicked()
                    {
                        discard_query = s
                            .actions
                            .next(&s.selection, &s.collections())
                            .map(|request| request.to_query());
                    }
                    if let Some(kind @ (ActionKind::Send | ActionKind::Scan)) = s.actions.active() {
                        let label = format!("Request {}", kind.label().to_lowercase());
                        if ui
                            .add_enabled(!s.selection.is_empty(), egui::Button::new(label))
                            .clicked()
                        {
                            submit = Some((kind, count));
                        }
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    let highlight = actions::highlight(s.actions.active());
                    let InboxScreen {
                        packages,
                        letters,
                        selection,
                        ..
                    } = &mut *s;
                    packages.show(ui, selection, &mut self.thumbs, highlight);
                    ui.add_space(24.0);
                    letters.show(ui, selection, &mut self.thumbs, highlight);
                });
        });
        s.actions.sync(&s.selection);

        if let Some((kind, count)) = submit {
            let ids = s.selection.ids().map(str::to_string).collect();
            match self
                .store
                .record_request(&s.customer_id, kind, ids, Utc::now())
            {
                Ok(request) => {
                    info!(request = %request.id, action = ?kind, "request recorded");
                    let fresh = self.store.inbox(&s.customer_id);
                    s.reload(fresh);
                    s.status = Some(format!("{} requested for {count} item(s)", kind.label()));
                }
                Err(e) => {
                    error!("Could not record request: {e:#}");
                    s.status = Some(format!("Could not save request: {e}"));
                }
            }
        }

        if refresh {
            let fresh = self.store.inbox(&s.customer_id);
            s.reload(fresh);
            s.status = None;
        }

        match discard_query {
            Some(query) => Screen::Discard(Box::new(DiscardScreen::new(s, &query))),
            None => Screen::Inbox(s),
        }
    }

    fn show_discard(&mut self, ctx: &egui::Context, mut s: Box<DiscardScreen>) -> Screen {
        let mut back = false;
        let mut confirm = false;

        egui::TopBottomPanel::bottom("discard_buttons").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Back").clicked() {
                    back = true;
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .add_enabled(!s.request.ids.is_empty(), egui::Button::new("Confirm"))
                        .clicked()
                    {
                        confirm = true;
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(format!("Discard {} item(s)?", s.request.count));
            ui.label("Discarded mail is destroyed and cannot be recovered.");
            ui.add_space(12.0);
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for group in s.request.groups(&s.inbox.collections()) {
                            ui.group(|ui| {
                                ui.horizontal(|ui| {
                                    for item in group {
                                        self.thumbs.show(ui, &item.image_source, 96.0);
                                    }
                                });
                            });
                        }
                    });
                });
        });

        if confirm {
            match self.store.record_request(
                &s.inbox.customer_id,
                ActionKind::Discard,
                s.request.ids.clone(),
                Utc::now(),
            ) {
                Ok(request) => {
                    info!(request = %request.id, count = s.request.count, "discard confirmed");
                    let fresh = self.store.inbox(&s.inbox.customer_id);
                    let inbox = &mut s.inbox;
                    inbox.reload(fresh);
                    inbox.status = Some(format!("Discard requested for {} item(s)", s.request.count));
                    return Screen::Inbox(s.inbox);
                }
                Err(e) => {
                    error!("Could not record discard: {e:#}");
                    s.inbox.status = Some(format!("Could not save request: {e}"));
                    return Screen::Inbox(s.inbox);
                }
            }
        }
        if back {
            return Screen::Inbox(s.inbox);
        }
        Screen::Discard(s)
    }

    fn refresh_admin(&mut self, s: &mut AdminScreen) {
        s.loaded = true;
        let Some(session) = &self.session else { return };
        let auth = match self.auth() {
            Ok(auth) => auth,
            Err(msg) => {
                s.status = Some(msg);
                return;
            }
        };
        let result = auth.authenticate(&session.token, Utc::now()).and_then(|user| {
            let dashboard = auth.admin_dashboard(&user, &self.store)?;
            Ok((dashboard, auth.customers()?))
        });
        match result {
            Ok((dashboard, customers)) => {
                s.dashboard = Some(dashboard);
                s.customers = customers;
            }
            Err(e) => {
                warn!("Admin refresh failed: {e}");
                s.status = Some(e.to_string());
            }
        }
        if let Some(id) = s.selected.clone() {
            let inbox = self.store.inbox(&id);
            s.deadline = inbox.deadline.clone();
            s.inbox = Some(inbox);
        }
    }

    fn show_admin(&mut self, ctx: &egui::Context, mut s: Box<AdminScreen>) -> Screen {
        let guard = RoleGuard::new(&[Role::Admin]);
        if let Err(e) = guard.check(self.session.as_ref().map(|session| &session.user)) {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.colored_label(ui.visuals().error_fg_color, e.to_string());
            });
            return Screen::Admin(s);
        }
        if !s.loaded {
            self.refresh_admin(&mut s);
        }

        let mut action = None;

        egui::SidePanel::left("customers")
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Customers");
                ui.separator();
                if s.customers.is_empty() {
                    ui.label(egui::RichText::new("No customers yet").weak());
                }
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for customer in &s.customers {
                        let selected = s.selected.as_deref() == Some(customer.id.as_str());
                        if ui.selectable_label(selected, &customer.email).clicked() {
                            action = Some(AdminAction::Select(customer.id.clone()));
                        }
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(dashboard) = &s.dashboard {
                    ui.heading(&dashboard.message);
                    ui.label(format!(
                        "{} users · {} inbox items",
                        dashboard.stats.total_users, dashboard.stats.total_inbox_items
                    ));
                }
                if ui.button("Refresh").clicked() {
                    action = Some(AdminAction::Refresh);
                }
            });
            if let Some(status) = &s.status {
                ui.label(status);
            }
            ui.separator();

            let Some(inbox) = &s.inbox else {
                ui.label("Select a customer to manage their inbox.");
                return;
            };

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Pick-up deadline (YY.MM.DD)");
                        ui.add(egui::TextEdit::singleline(&mut s.deadline).desired_width(90.0));
                        if ui.button("Save").clicked() {
                            action = Some(AdminAction::SaveDeadline);
                        }
                    });

                    for kind in PhotoKind::ALL {
                        ui.add_space(12.0);
                        ui.horizontal(|ui| {
                            ui.heading(kind.label());
                            if ui.button("Upload…").clicked() {
                                action = Some(AdminAction::Upload(kind));
                            }
                        });
                        for item in inbox.photos(kind) {
                            ui.horizontal(|ui| {
                                self.thumbs.show(ui, &item.image_source, SMALL_THUMB);
                                ui.vertical(|ui| {
                                    ui.monospace(&item.id);
                                    ui.label(&item.description);
                                    if ui.small_button("Remove").clicked() {
                                        action = Some(AdminAction::Remove(kind, item.id.clone()));
                                    }
                                });
                            });
                        }
                    }

                    ui.add_space(12.0);
                    ui.heading("Requests");
                    if inbox.requests.is_empty() {
                        ui.label(egui::RichText::new("No requests").weak());
                    }
                    for request in inbox.requests.iter().rev() {
                        ui.horizontal(|ui| {
                            ui.label(format!(
                                "{} · {} item(s) · {}",
                                request.action.label(),
                                request.item_ids.len(),
                                request.requested_at.format("%Y-%m-%d %H:%M")
                            ));
                            match request.status {
                                InboxStatus::ActionRequested => {
                                    if ui.small_button("Mark completed").clicked() {
                                        action = Some(AdminAction::Complete(request.id.clone()));
                                    }
                                }
                                InboxStatus::Completed => {
                                    ui.label(egui::RichText::new("Completed").weak());
                                }
                                InboxStatus::Received => {}
                            }
                        });
                    }
                });
        });

        if let Some(action) = action {
            self.apply_admin(&mut s, action);
        }
        Screen::Admin(s)
    }

    fn apply_admin(&mut self, s: &mut AdminScreen, action: AdminAction) {
        let customer = s.selected.clone();
        let result = match (action, customer) {
            (AdminAction::Refresh, _) => {
                self.refresh_admin(s);
                return;
            }
            (AdminAction::Select(id), _) => {
                s.selected = Some(id);
                s.status = None;
                self.refresh_admin(s);
                return;
            }
            (_, None) => return,
            (AdminAction::SaveDeadline, Some(id)) => self
                .store
                .update_deadline(&id, &s.deadline)
                .map(|_| "Deadline saved".to_string()),
            (AdminAction::Upload(kind), Some(id)) => {
                let Some(paths) = rfd::FileDialog::new()
                    .add_filter("Images", SUPPORTED_IMAGE_EXTS)
                    .pick_files()
                else {
                    return;
                };
                upload::import_photos(&mut self.store, &self.data_dir, &id, kind, &paths, Utc::now())
                    .map(|photos| format!("Uploaded {} photo(s)", photos.len()))
                    .map_err(anyhow::Error::from)
            }
            (AdminAction::Remove(kind, photo_id), Some(id)) => self
                .store
                .remove_photo(&id, kind, &photo_id)
                .map(|_| format!("Removed {photo_id}")),
            (AdminAction::Complete(request_id), Some(id)) => self
                .store
                .complete_request(&id, &request_id)
                .map(|_| "Request completed".to_string()),
        };
        s.status = Some(match result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Admin action failed: {e:#}");
                e.to_string()
            }
        });
        self.refresh_admin(s);
    }
}

fn show_form_error(ui: &mut egui::Ui, error: Option<&str>) {
    if let Some(error) = error {
        ui.colored_label(ui.visuals().error_fg_color, error);
    }
}

impl eframe::App for MailroomApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Track window size for saving on exit
        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = Some(rect.width());
            self.config.window_height = Some(rect.height());
        }

        self.thumbs.poll(ctx);
        self.top_bar(ctx);

        let screen = std::mem::replace(&mut self.screen, Screen::Login);
        self.screen = match screen {
            Screen::Login => self.show_login(ctx),
            Screen::Signup => self.show_signup(ctx),
            Screen::Inbox(s) => self.show_inbox(ctx, s),
            Screen::Discard(s) => self.show_discard(ctx, s),
            Screen::Admin(s) => self.show_admin(ctx, s),
        };
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.config.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::items;
    use crate::gallery::InteractionMode;
    use crate::inbox::MemoryInboxStore;

    fn customer() -> AuthUser {
        AuthUser {
            user_id: "c1".to_string(),
            email: "c1@example.com".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn recorded_request_reloads_both_galleries() {
        let mut store = MemoryInboxStore::default();
        store
            .append_photos("c1", PhotoKind::Packages, items("pkg", 4))
            .unwrap();
        store
            .append_photos("c1", PhotoKind::Letters, items("let", 2))
            .unwrap();
        let mut screen = InboxScreen::new(&customer(), store.inbox("c1"), Duration::from_millis(500));
        screen.actions.activate(ActionKind::Discard, &mut screen.selection);
        let packages = screen.packages.gallery().collection().clone();
        screen.selection.toggle(&packages, "pkg-1");

        store.remove_photo("c1", PhotoKind::Packages, "pkg-3").unwrap();
        store.remove_photo("c1", PhotoKind::Packages, "pkg-4").unwrap();
        store
            .record_request("c1", ActionKind::Discard, vec!["let-1".to_string()], Utc::now())
            .unwrap();
        screen.reload(store.inbox("c1"));

        assert_eq!(screen.packages.gallery().collection().len(), 2);
        assert_eq!(screen.letters.gallery().collection().len(), 2);
        assert_eq!(screen.pending, 1);
        assert!(screen.selection.is_empty());
        assert_eq!(screen.selection.mode(), InteractionMode::Browsing);
        assert_eq!(screen.actions.active(), None);
    }
}
