use anyhow::Result;
use clap::Parser;
use eframe::{
    egui::{self, Color32, RichText, TextureHandle, Ui},
    App, CreationContext, Frame, NativeOptions,
};
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

use stockdesk::api::{load_edit_bundle, ApiError, BackendClient, EditBundle};
use stockdesk::auth::{CredentialStore, FileCredentialStore};
use stockdesk::config;
use stockdesk::model::{MaterialRecord, PendingImage, ReferenceOption, UpdateResponse};
use stockdesk::state::{
    decode_preview, sniff_mime, AfterSubmit, DecodedPreview, EditPhase, EditSession,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let base_url = cfg.base_url()?;

    let credentials: Arc<dyn CredentialStore> = match &cfg.auth.token_path {
        Some(path) => Arc::new(FileCredentialStore::new(path)),
        None => Arc::new(FileCredentialStore::at_default_location()?),
    };
    let client = Arc::new(BackendClient::new(base_url));
    let runtime = Runtime::new()?;
    let ui_scale = cfg.ui.scale;

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1180.0, 760.0])
            .with_resizable(true),
        ..Default::default()
    };

    info!("starting stockdesk console");
    eframe::run_native(
        "Stockdesk",
        options,
        Box::new(move |cc| {
            Ok(Box::new(ConsoleApp::new(
                cc,
                runtime,
                client,
                credentials,
                ui_scale,
            )))
        }),
    )
    .map_err(|err| anyhow::anyhow!("eframe: {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppScreen {
    SignIn,
    Listing,
    Edit,
}

enum AppEvent {
    ListingLoaded(Result<Vec<MaterialRecord>, ApiError>),
    BundleLoaded(Result<EditBundle, ApiError>),
    PreviewDecoded(DecodedPreview),
    ImagePicked {
        image: PendingImage,
        preview: Option<DecodedPreview>,
    },
    SubmitFinished(Result<UpdateResponse, ApiError>),
}

struct ConsoleApp {
    runtime: Runtime,
    client: Arc<BackendClient>,
    credentials: Arc<dyn CredentialStore>,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
    screen: AppScreen,
    status: String,
    ui_scale: f32,
    token_input: String,
    listing: Vec<MaterialRecord>,
    listing_pending: bool,
    edit: Option<EditSession>,
    preview_texture: Option<TextureHandle>,
}

impl ConsoleApp {
    fn new(
        cc: &CreationContext<'_>,
        runtime: Runtime,
        client: Arc<BackendClient>,
        credentials: Arc<dyn CredentialStore>,
        ui_scale: f32,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        let (tx, rx) = mpsc::channel();
        let mut app = Self {
            runtime,
            client,
            credentials,
            tx,
            rx,
            screen: AppScreen::SignIn,
            status: "Ready".to_string(),
            ui_scale,
            token_input: String::new(),
            listing: Vec::new(),
            listing_pending: false,
            edit: None,
            preview_texture: None,
        };
        if app.credentials.load().is_some() {
            app.screen = AppScreen::Listing;
            app.spawn_listing_fetch(&cc.egui_ctx);
        }
        app
    }

    fn card_frame() -> egui::Frame {
        egui::Frame::default()
            .fill(Color32::from_rgba_unmultiplied(255, 255, 255, 7))
            .stroke(egui::Stroke::new(
                1.0,
                Color32::from_rgba_unmultiplied(255, 255, 255, 20),
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(10.0))
    }

    fn labeled_singleline(ui: &mut Ui, label: &str, value: &mut String) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.text_edit_singleline(value);
        });
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::ListingLoaded(outcome) => {
                self.listing_pending = false;
                match outcome {
                    Ok(records) => {
                        self.status = format!("{} materials", records.len());
                        self.listing = records;
                    }
                    Err(ApiError::Unauthorized) => {
                        self.credentials.clear();
                        self.status = "Session expired, sign in again".to_string();
                    }
                    Err(err) => {
                        error!(%err, "listing fetch failed");
                        self.status = format!("Listing failed: {err}");
                    }
                }
            }
            AppEvent::BundleLoaded(outcome) => {
                let image_url = outcome
                    .as_ref()
                    .ok()
                    .map(|bundle| bundle.record.image_url.clone());
                if let Some(session) = self.edit.as_mut() {
                    session.apply_load(outcome, self.credentials.as_ref());
                    self.status = match &session.last_error {
                        Some(message) => message.clone(),
                        None => "Material loaded".to_string(),
                    };
                }
                if let Some(url) = image_url.filter(|url| !url.is_empty()) {
                    self.spawn_preview_fetch(ctx, url);
                }
            }
            AppEvent::PreviewDecoded(preview) => {
                if self.edit.is_some() {
                    self.set_preview_texture(ctx, &preview);
                }
            }
            AppEvent::ImagePicked { image, preview } => {
                if let Some(session) = self.edit.as_mut() {
                    self.status = format!("Selected {}", image.file_name);
                    session.attach_image(image);
                    if let Some(preview) = preview {
                        self.set_preview_texture(ctx, &preview);
                    }
                }
            }
            AppEvent::SubmitFinished(outcome) => {
                let mut after = AfterSubmit::Stay;
                if let Some(session) = self.edit.as_mut() {
                    after = session.apply_submit(outcome, self.credentials.as_ref());
                    self.status = match &session.last_error {
                        Some(message) => message.clone(),
                        None => "Material updated".to_string(),
                    };
                }
                if after == AfterSubmit::GoToListing {
                    self.close_editor(ctx);
                }
            }
        }
    }

    fn set_preview_texture(&mut self, ctx: &egui::Context, preview: &DecodedPreview) {
        let color_image = egui::ColorImage::from_rgba_unmultiplied(preview.size, &preview.rgba);
        self.preview_texture =
            Some(ctx.load_texture("material_image", color_image, egui::TextureOptions::LINEAR));
    }

    fn spawn_listing_fetch(&mut self, ctx: &egui::Context) {
        let Some(token) = self.credentials.load() else {
            self.status = "Not signed in".to_string();
            return;
        };
        self.listing_pending = true;
        let client = self.client.clone();
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = client.materials(&token).await;
            let _ = tx.send(AppEvent::ListingLoaded(outcome));
            ctx.request_repaint();
        });
    }

    fn open_editor(&mut self, ctx: &egui::Context, id: String) {
        info!(material_id = %id, "opening material editor");
        self.preview_texture = None;
        self.edit = Some(EditSession::new(id.clone()));
        self.screen = AppScreen::Edit;
        let Some(token) = self.credentials.load() else {
            self.status = "Not signed in".to_string();
            return;
        };
        self.status = "Loading material…".to_string();
        let client = self.client.clone();
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = load_edit_bundle(client.as_ref(), &token, &id).await;
            let _ = tx.send(AppEvent::BundleLoaded(outcome));
            ctx.request_repaint();
        });
    }

    fn close_editor(&mut self, ctx: &egui::Context) {
        self.edit = None;
        self.preview_texture = None;
        self.screen = AppScreen::Listing;
        self.spawn_listing_fetch(ctx);
    }

    fn spawn_preview_fetch(&self, ctx: &egui::Context, url: String) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            match client.fetch_image_bytes(&url).await {
                Ok(bytes) => {
                    if let Some(preview) = decode_preview(&bytes) {
                        let _ = tx.send(AppEvent::PreviewDecoded(preview));
                        ctx.request_repaint();
                    }
                }
                Err(err) => debug!(%err, %url, "preview image fetch failed"),
            }
        });
    }

    fn pick_image(&self, ctx: &egui::Context) {
        let Some(path) = FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "bmp"])
            .pick_file()
        else {
            return;
        };
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || match std::fs::read(&path) {
            Ok(bytes) => {
                let file_name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("image.bin")
                    .to_string();
                let mime = sniff_mime(&bytes).to_string();
                let preview = decode_preview(&bytes);
                let _ = tx.send(AppEvent::ImagePicked {
                    image: PendingImage {
                        file_name,
                        mime,
                        bytes,
                    },
                    preview,
                });
                ctx.request_repaint();
            }
            Err(err) => debug!(%err, "could not read selected image"),
        });
    }

    fn submit_edit(&mut self, ctx: &egui::Context) {
        let Some(token) = self.credentials.load() else {
            self.status = "Not signed in".to_string();
            return;
        };
        let Some(session) = self.edit.as_mut() else {
            return;
        };
        if !session.begin_submit() {
            return;
        }
        let id = session.material_id.clone();
        let draft = session.draft.clone();
        let image = session.pending_image.clone();
        let client = self.client.clone();
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = client
                .update_material(&token, &id, &draft, image.as_ref())
                .await;
            let _ = tx.send(AppEvent::SubmitFinished(outcome));
            ctx.request_repaint();
        });
        self.status = "Saving material…".to_string();
    }

    fn top_bar(&mut self, ctx: &egui::Context) {
        let mut do_refresh = false;
        let mut do_sign_out = false;
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new("Stockdesk").strong().size(16.0));
                ui.separator();
                ui.label(match self.screen {
                    AppScreen::SignIn => "Sign In",
                    AppScreen::Listing => "Materials",
                    AppScreen::Edit => "Material Edit",
                });
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.screen != AppScreen::SignIn {
                        if ui.button("Sign Out").clicked() {
                            do_sign_out = true;
                        }
                        if self.screen == AppScreen::Listing && ui.button("⟳ Refresh").clicked() {
                            do_refresh = true;
                        }
                    }
                });
            });
        });
        if do_sign_out {
            self.credentials.clear();
            self.edit = None;
            self.preview_texture = None;
            self.listing.clear();
            self.screen = AppScreen::SignIn;
            self.status = "Signed out".to_string();
        }
        if do_refresh {
            self.spawn_listing_fetch(ctx);
        }
    }

    fn sign_in_screen(&mut self, ctx: &egui::Context) {
        let mut do_sign_in = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.22);
                ui.heading("Stockdesk");
                ui.label(
                    RichText::new("Facilities material console")
                        .size(13.0)
                        .color(Color32::from_gray(180)),
                );
                ui.add_space(14.0);
                ui.label(RichText::new("Access token").strong());
                ui.add_sized(
                    [320.0, 22.0],
                    egui::TextEdit::singleline(&mut self.token_input)
                        .password(true)
                        .hint_text("Paste a token issued by the backend"),
                );
                ui.add_space(8.0);
                if ui
                    .add_sized(
                        [320.0, 28.0],
                        egui::Button::new(RichText::new("Sign In").strong()),
                    )
                    .clicked()
                {
                    do_sign_in = true;
                }
            });
        });
        if do_sign_in {
            let token = self.token_input.trim().to_string();
            if token.is_empty() {
                self.status = "Enter an access token".to_string();
                return;
            }
            match self.credentials.store(&token) {
                Ok(()) => {
                    self.token_input.clear();
                    self.screen = AppScreen::Listing;
                    self.status = "Signed in".to_string();
                    self.spawn_listing_fetch(ctx);
                }
                Err(err) => {
                    error!(%err, "failed to persist credential");
                    self.status = format!("Could not store credential: {err}");
                }
            }
        }
    }

    fn listing_screen(&mut self, ctx: &egui::Context) {
        let mut open_id: Option<String> = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Materials");
            if self.listing_pending {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading materials…");
                });
            }
            ui.add_space(6.0);
            egui::ScrollArea::vertical().show(ui, |ui| {
                egui::Grid::new("materials")
                    .striped(true)
                    .num_columns(4)
                    .min_col_width(110.0)
                    .show(ui, |ui| {
                        ui.label(RichText::new("Name").strong());
                        ui.label(RichText::new("Detail").strong());
                        ui.label(RichText::new("Total").strong());
                        ui.label("");
                        ui.end_row();
                        for record in &self.listing {
                            ui.label(&record.name);
                            ui.label(&record.detail);
                            ui.label(&record.total);
                            if ui.button("Edit").clicked() {
                                open_id = Some(record.id.clone());
                            }
                            ui.end_row();
                        }
                    });
                if self.listing.is_empty() && !self.listing_pending {
                    ui.add_space(8.0);
                    ui.label("No materials loaded.");
                }
            });
        });
        if let Some(id) = open_id {
            self.open_editor(ctx, id);
        }
    }

    fn edit_screen(&mut self, ctx: &egui::Context) {
        let mut do_pick = false;
        let mut do_submit = false;
        let mut do_cancel = false;
        let texture = self.preview_texture.clone();

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = self.edit.as_mut() else {
                ui.label("No material selected.");
                return;
            };
            ui.heading("Material Edit");
            ui.add_space(6.0);

            if session.phase == EditPhase::Loading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading material…");
                });
                if let Some(message) = &session.last_error {
                    ui.add_space(6.0);
                    ui.label(RichText::new(message).color(Color32::from_rgb(255, 130, 130)));
                }
                return;
            }

            ui.columns(2, |columns| {
                Self::card_frame().show(&mut columns[0], |ui| {
                    ui.label(RichText::new("Record").strong());
                    Self::labeled_singleline(ui, "Name", &mut session.draft.name);
                    Self::labeled_singleline(ui, "Detail", &mut session.draft.detail);

                    let unit_text =
                        picker_text(&session.unit_options, &session.draft.unit_id, "Select unit");
                    egui::ComboBox::from_label("Unit")
                        .selected_text(unit_text)
                        .show_ui(ui, |ui| {
                            for option in &session.unit_options {
                                ui.selectable_value(
                                    &mut session.draft.unit_id,
                                    option.value.clone(),
                                    option.label.as_str(),
                                );
                            }
                        });

                    let floor_text = picker_text(
                        &session.floor_options,
                        &session.draft.floor_id,
                        "Select floor",
                    );
                    egui::ComboBox::from_label("Floor")
                        .selected_text(floor_text)
                        .show_ui(ui, |ui| {
                            for option in &session.floor_options {
                                ui.selectable_value(
                                    &mut session.draft.floor_id,
                                    option.value.clone(),
                                    option.label.as_str(),
                                );
                            }
                        });

                    Self::labeled_singleline(ui, "Total", &mut session.draft.total);

                    if !session.created_at.is_empty() {
                        ui.horizontal(|ui| {
                            ui.label("Created");
                            ui.label(
                                RichText::new(format_created_at(&session.created_at))
                                    .color(Color32::from_gray(170)),
                            );
                        });
                    }
                });

                Self::card_frame().show(&mut columns[1], |ui| {
                    ui.label(RichText::new("Image").strong());
                    if let Some(texture) = &texture {
                        let w = ui.available_width().max(120.0);
                        let h = (w * 0.6).clamp(120.0, 260.0);
                        ui.add(egui::Image::new(texture).fit_to_exact_size(egui::vec2(w, h)));
                    } else {
                        ui.add_space(24.0);
                        ui.label(RichText::new("No image").color(Color32::from_gray(140)));
                        ui.add_space(24.0);
                    }
                    if let Some(pending) = &session.pending_image {
                        ui.small(&pending.file_name);
                    }
                    if ui.button("🖼 Upload Image").clicked() {
                        do_pick = true;
                    }
                });
            });

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                let submitting = session.phase == EditPhase::Submitting;
                if ui
                    .add_enabled(
                        !submitting,
                        egui::Button::new(RichText::new("Update").strong()),
                    )
                    .clicked()
                {
                    do_submit = true;
                }
                if ui.button("Cancel").clicked() {
                    do_cancel = true;
                }
                if submitting {
                    ui.spinner();
                    ui.label("Saving…");
                }
            });
        });

        if do_pick {
            self.pick_image(ctx);
        }
        if do_submit {
            self.submit_edit(ctx);
        }
        if do_cancel {
            self.close_editor(ctx);
            self.status = "Edit cancelled".to_string();
        }
    }
}

impl App for ConsoleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        ctx.set_pixels_per_point(self.ui_scale);
        self.drain_events(ctx);
        self.top_bar(ctx);

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.label(self.status.as_str());
            });
        });

        match self.screen {
            AppScreen::SignIn => self.sign_in_screen(ctx),
            AppScreen::Listing => self.listing_screen(ctx),
            AppScreen::Edit => self.edit_screen(ctx),
        }
    }
}

fn picker_text(options: &[ReferenceOption], value: &str, placeholder: &str) -> String {
    if let Some(option) = options.iter().find(|option| option.value == value) {
        option.label.clone()
    } else if value.is_empty() {
        placeholder.to_string()
    } else {
        // Record references an entry missing from the loaded list; shown raw
        // and submitted untouched.
        value.to_string()
    }
}

fn format_created_at(raw: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(timestamp) => timestamp.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}
