//! Text rendering of search states and hostel cards

use crate::search::{Hostel, SearchRequestState};
use anyhow::Result;
use serde::Serialize;
use tera::{Context, Tera};

/// Shown for a successful search without matches
pub const NO_RESULTS_MESSAGE: &str = "No hostels found. Try a different search query.";

/// Fields of a hostel as a card displays them
#[derive(Debug, Serialize)]
struct CardView<'a> {
    name: &'a str,
    location: &'a str,
    description: &'a str,
    facilities: Vec<&'a str>,
    room_types: Vec<&'a str>,
    rent: &'a str,
    rating: &'a str,
    contact: &'a str,
}

impl<'a> From<&'a Hostel> for CardView<'a> {
    fn from(hostel: &'a Hostel) -> Self {
        Self {
            name: hostel.name().unwrap_or_default(),
            location: hostel.location().unwrap_or_default(),
            description: hostel.description().unwrap_or_default(),
            facilities: hostel.facilities(),
            room_types: hostel.room_types(),
            rent: hostel.monthly_rent().unwrap_or_default(),
            rating: hostel.ratings().unwrap_or_default(),
            contact: hostel.contact().unwrap_or_default(),
        }
    }
}

/// Template renderer
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Create a new renderer with embedded templates
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("card.txt", include_str!("../templates/card.txt"))?;
        Ok(Self { tera })
    }

    /// Render one hostel card
    pub fn render_card(&self, hostel: &Hostel) -> Result<String> {
        let ctx = Context::from_serialize(CardView::from(hostel))?;
        Ok(self.tera.render("card.txt", &ctx)?)
    }

    /// Render the view for a state: spinner line, error, empty notice or cards
    pub fn render_state(&self, state: &SearchRequestState) -> Result<String> {
        let view = match state {
            SearchRequestState::Idle => String::new(),
            SearchRequestState::Pending { query, .. } => format!("Searching for \"{query}\"..."),
            SearchRequestState::Failed { message, .. } => format!("Error: {message}"),
            SearchRequestState::Succeeded { results, .. } if results.is_empty() => {
                NO_RESULTS_MESSAGE.to_string()
            }
            SearchRequestState::Succeeded { results, .. } => results
                .iter()
                .map(|hostel| self.render_card(hostel))
                .collect::<Result<Vec<_>>>()?
                .join("\n"),
        };
        Ok(view)
    }
}
