//! Card positions on the freeform canvas.
//!
//! The store is a plain collaborator: it never talks to providers and only
//! receives payload values (image and video URLs) from the core.

use serde::Serialize;
use uuid::Uuid;

pub const MAX_INPUT_CHARS: usize = 5000;

pub const CARDS_PER_ROW: usize = 3;
pub const CARD_WIDTH: i32 = 360;
pub const CARD_GAP: i32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardKind {
    Writing,
    ImageGen,
    Translation,
    Emotion,
    VideoGen,
    Image,
    Video,
}

impl CardKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Writing => "writing",
            Self::ImageGen => "image-gen",
            Self::Translation => "translation",
            Self::Emotion => "emotion",
            Self::VideoGen => "video-gen",
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Desktop,
    Mobile,
}

impl Layout {
    fn margins(self) -> (i32, i32) {
        match self {
            Self::Desktop => (48, 72),
            Self::Mobile => (24, 40),
        }
    }

    fn card_height(self) -> i32 {
        match self {
            Self::Desktop => 360,
            Self::Mobile => 320,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: String,
    pub kind: CardKind,
    pub url: Option<String>,
    pub x: i32,
    pub y: i32,
    pub z: u64,
}

/// Grid slot for the `index`-th card. Mobile layouts use a single column.
pub fn grid_position(index: usize, layout: Layout) -> (i32, i32) {
    let (margin_left, margin_top) = layout.margins();
    let row_height = layout.card_height() + CARD_GAP;
    let (row, col) = match layout {
        Layout::Desktop => (index / CARDS_PER_ROW, index % CARDS_PER_ROW),
        Layout::Mobile => (index, 0),
    };
    let x = margin_left + col as i32 * (CARD_WIDTH + CARD_GAP);
    let y = margin_top + row as i32 * row_height;
    (x, y)
}

#[derive(Debug, Clone)]
pub struct CardStore {
    cards: Vec<Card>,
    layout: Layout,
    raised: u64,
}

impl CardStore {
    /// Store seeded with the writing, image, translation and emotion cards.
    pub fn new(layout: Layout) -> Self {
        let mut store = Self {
            cards: Vec::new(),
            layout,
            raised: 0,
        };
        for kind in [
            CardKind::Writing,
            CardKind::ImageGen,
            CardKind::Translation,
            CardKind::Emotion,
        ] {
            store.push(kind.as_str().to_string(), kind, None);
        }
        store
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == id)
    }

    /// Add the video card once; later calls are no-ops.
    pub fn enable_video(&mut self) -> &Card {
        let index = match self.cards.iter().position(|card| card.kind == CardKind::VideoGen) {
            Some(index) => index,
            None => {
                let kind = CardKind::VideoGen;
                self.push(kind.as_str().to_string(), kind, None);
                self.cards.len() - 1
            }
        };
        &self.cards[index]
    }

    /// Append one image card per URL after all existing cards.
    pub fn add_images(&mut self, urls: &[String]) -> Vec<Card> {
        urls.iter()
            .map(|url| {
                self.push(Uuid::new_v4().to_string(), CardKind::Image, Some(url.clone()))
                    .clone()
            })
            .collect()
    }

    pub fn add_video(&mut self, url: &str) -> Card {
        self.push(
            Uuid::new_v4().to_string(),
            CardKind::Video,
            Some(url.to_string()),
        )
        .clone()
    }

    /// Move a card, clamping `y` at the top edge, and raise it above the rest.
    pub fn move_card(&mut self, id: &str, x: i32, y: i32) -> Option<&Card> {
        let card = self.cards.iter_mut().find(|card| card.id == id)?;
        self.raised += 1;
        card.x = x;
        card.y = y.max(0);
        card.z = self.raised;
        Some(card)
    }

    pub fn top_card(&self) -> Option<&Card> {
        self.cards
            .iter()
            .filter(|card| card.z > 0)
            .max_by_key(|card| card.z)
    }

    fn push(&mut self, id: String, kind: CardKind, url: Option<String>) -> &Card {
        let (x, y) = grid_position(self.cards.len(), self.layout);
        self.cards.push(Card {
            id,
            kind,
            url,
            x,
            y,
            z: 0,
        });
        &self.cards[self.cards.len() - 1]
    }
}

impl Default for CardStore {
    fn default() -> Self {
        Self::new(Layout::Desktop)
    }
}

/// Cap `text` at [`MAX_INPUT_CHARS`] characters.
pub fn clamp_input(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
