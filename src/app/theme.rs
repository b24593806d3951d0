use eframe::egui::{Color32, Visuals};

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Palette {
    pub(crate) background: Color32,
    pub(crate) node: Color32,
    pub(crate) node_hovered: Color32,
    pub(crate) edge: Color32,
    pub(crate) edge_highlighted: Color32,
    pub(crate) text: Color32,
    pub(crate) text_hovered: Color32,
}

impl Palette {
    pub(crate) fn day() -> Self {
        Self {
            background: Color32::from_rgb(0xfd, 0xf6, 0xe3),
            node: Color32::from_rgb(0x2a, 0xa1, 0x98),
            node_hovered: Color32::from_rgb(0x26, 0x8b, 0xd2),
            edge: Color32::from_rgba_unmultiplied(147, 161, 161, 77),
            edge_highlighted: Color32::from_rgba_unmultiplied(38, 139, 210, 153),
            text: Color32::from_rgb(0x65, 0x7b, 0x83),
            text_hovered: Color32::from_rgb(0x07, 0x36, 0x42),
        }
    }

    pub(crate) fn night() -> Self {
        Self {
            background: Color32::from_rgb(0x00, 0x2b, 0x36),
            edge: Color32::from_rgba_unmultiplied(88, 110, 117, 77),
            text: Color32::from_rgb(0x93, 0xa1, 0xa1),
            text_hovered: Color32::from_rgb(0xfd, 0xf6, 0xe3),
            ..Self::day()
        }
    }

    pub(crate) fn for_mode(night: bool) -> Self {
        if night { Self::night() } else { Self::day() }
    }

    pub(crate) fn visuals(night: bool) -> Visuals {
        if night { Visuals::dark() } else { Visuals::light() }
    }
}
