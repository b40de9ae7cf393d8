use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub surface_0: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub surface_3: Color32,
    pub accent: Color32,
    pub accent_muted: Color32,
    pub danger: Color32,
    pub danger_muted: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub new_row_tint: Color32,
    pub header_tint: Color32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub radius: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface_0: Color32::from_rgb(0x0F, 0x11, 0x15),
            surface_1: Color32::from_rgb(0x16, 0x1A, 0x20),
            surface_2: Color32::from_rgb(0x1C, 0x22, 0x2B),
            surface_3: Color32::from_rgb(0x22, 0x2A, 0x35),
            accent: Color32::from_rgb(0x3B, 0x82, 0xF6),
            accent_muted: Color32::from_rgb(0x2F, 0x6E, 0xD8),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            danger_muted: Color32::from_rgb(0x8B, 0x00, 0x00),
            text_primary: Color32::from_rgb(0xE6, 0xED, 0xF3),
            text_muted: Color32::from_rgb(0x8B, 0x94, 0x9E),
            new_row_tint: Color32::from_rgba_premultiplied(0x4A, 0x4A, 0x4A, 0x44),
            header_tint: Color32::from_rgb(0x22, 0x2A, 0x35),
            spacing_8: 8.0,
            spacing_12: 12.0,
            radius: 10,
        }
    }
}

impl Theme {
    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_1;
        visuals.extreme_bg_color = self.surface_0;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.bg_fill = self.surface_2;
        visuals.widgets.noninteractive.bg_stroke = Stroke::NONE;
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.weak_bg_fill = self.surface_2;
        visuals.widgets.hovered.bg_fill = self.surface_3;
        visuals.widgets.hovered.weak_bg_fill = self.surface_3;
        visuals.widgets.active.bg_fill = self.accent_muted;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.hyperlink_color = self.accent;
        visuals.window_fill = self.surface_1;
        visuals.window_corner_radius = CornerRadius::same(self.radius);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(17.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    pub fn card_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_2)
            .inner_margin(Margin::same(self.spacing_12 as i8))
            .corner_radius(CornerRadius::same(self.radius))
            .stroke(Stroke::NONE)
    }

    pub fn tag_button(&self, column: &str, value: &str) -> egui::Button<'static> {
        let text = egui::RichText::new(format!("{column}\n\"{value}\""))
            .color(Color32::WHITE)
            .size(12.0);
        egui::Button::new(text).fill(self.danger_muted)
    }

    pub fn warn_button(&self, label: &str, active: bool) -> egui::Button<'static> {
        let button = egui::Button::new(label.to_string());
        if active {
            button.fill(self.danger)
        } else {
            button
        }
    }
}
