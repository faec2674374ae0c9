/// Daily Horoscope Tool
///
/// `generate_daily_horoscope` produces a horoscope card: AI-written text,
/// a lucky number, color and vibe, and a rendered PNG that is saved to the
/// output directory and returned inline.

pub mod render;
pub mod writer;
pub mod zodiac;

use chrono::{Local, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::core::protocol::{ContentBlock, ToolResult};
use crate::core::registry::{MCPTool, Tool};
use render::{CardSize, CardSpec};
use writer::HoroscopeWriter;
use zodiac::{DAILY_VIBES, Style, ZodiacSign};

pub const TOOL_NAME: &str = "generate_daily_horoscope";

/// Failures inside the tool; all of them surface as error results.
#[derive(Debug, Error)]
pub enum HoroscopeError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("text generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected text generation response: {0}")]
    UpstreamShape(String),
    #[error("failed to encode card: {0}")]
    Render(#[from] image::ImageError),
    #[error("failed to load card fonts: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
    #[error("failed to build result payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to save card: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to render card: {0}")]
    Task(String),
}

/// Validated tool arguments.
#[derive(Debug, Deserialize)]
pub struct HoroscopeArgs {
    pub zodiac_sign: ZodiacSign,
    #[serde(default)]
    pub style: Style,
}

/// Where and how big cards are rendered.
#[derive(Debug, Clone)]
pub struct CardOptions {
    pub output_dir: PathBuf,
    pub size: CardSize,
}

/// Lucky values drawn for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fortune {
    pub lucky_number: u8,
    pub lucky_color: &'static str,
    pub daily_vibe: &'static str,
    /// Seed for the card's decorative scatter
    pub art_seed: u64,
}

pub struct HoroscopeTool<W> {
    writer: W,
    rng: Mutex<StdRng>,
    options: CardOptions,
}

impl<W: HoroscopeWriter> HoroscopeTool<W> {
    /// `seed` fixes the lucky-value sequence; `None` seeds from entropy.
    pub fn new(writer: W, options: CardOptions, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            writer,
            rng: Mutex::new(rng),
            options,
        }
    }

    /// Draw lucky number (1-99), color and vibe for `sign`.
    pub fn draw_fortune(&self, sign: ZodiacSign) -> Fortune {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let lucky_number = rng.gen_range(1..=99);
        let lucky_color = sign
            .element()
            .lucky_colors()
            .choose(&mut *rng)
            .copied()
            .unwrap_or("Gold");
        let daily_vibe = DAILY_VIBES.choose(&mut *rng).copied().unwrap_or("Calm & Reflective");
        Fortune {
            lucky_number,
            lucky_color,
            daily_vibe,
            art_seed: rng.next_u64(),
        }
    }

    async fn generate(&self, args: &HoroscopeArgs) -> Result<ToolResult, HoroscopeError> {
        let sign = args.zodiac_sign;
        let style = args.style;
        info!(%sign, %style, "generating horoscope");

        let fortune = self.draw_fortune(sign);
        let horoscope_text = self.writer.write(sign).await?;
        let date = Local::now().format("%A, %B %-d, %Y").to_string();

        let card = CardSpec {
            sign,
            style,
            date: date.clone(),
            horoscope: horoscope_text.clone(),
            lucky_number: fortune.lucky_number,
            lucky_color: fortune.lucky_color.to_string(),
            daily_vibe: fortune.daily_vibe.to_string(),
            seed: fortune.art_seed,
        };
        let size = self.options.size;
        let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, HoroscopeError> {
            let img = render::render_card(&card, size)?;
            Ok(render::encode_png(&img)?)
        })
        .await
        .map_err(|e| HoroscopeError::Task(e.to_string()))??;

        tokio::fs::create_dir_all(&self.options.output_dir).await?;
        let file_name = card_file_name(sign, style);
        let image_path = self.options.output_dir.join(&file_name);
        tokio::fs::write(&image_path, &png).await?;

        let payload = json!({
            "success": true,
            "zodiac_sign": sign,
            "style": style,
            "date": date,
            "element": sign.element(),
            "symbol": sign.symbol().to_string(),
            "horoscope_text": horoscope_text,
            "lucky_number": fortune.lucky_number,
            "lucky_color": fortune.lucky_color,
            "daily_vibe": fortune.daily_vibe,
            "image_path": image_path.display().to_string(),
            "image_url": format!("/output/{file_name}"),
        });
        let text = serde_json::to_string_pretty(&payload)?;

        info!(%sign, file = %file_name, "horoscope card saved");
        Ok(ToolResult::success(vec![
            ContentBlock::text(text),
            ContentBlock::image(png, "image/png"),
        ]))
    }
}

/// `<sign>_<style>_<unix-millis>_<8 hex>.png`; the suffix keeps cards from
/// the same millisecond apart.
fn card_file_name(sign: ZodiacSign, style: Style) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{sign}_{style}_{}_{}.png",
        Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

impl<W: HoroscopeWriter> Tool for HoroscopeTool<W> {
    type Args = HoroscopeArgs;

    fn descriptor(&self) -> MCPTool {
        MCPTool {
            name: TOOL_NAME.to_string(),
            description: "Generates a beautiful daily horoscope graphic with AI-generated text, \
                lucky number, lucky color, and daily vibe. Returns an Instagram story-sized \
                image (1080x1920)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "zodiac_sign": {
                        "type": "string",
                        "enum": ZodiacSign::ALL.map(ZodiacSign::as_str),
                        "description": "The zodiac sign for the horoscope"
                    },
                    "style": {
                        "type": "string",
                        "enum": Style::ALL.map(Style::as_str),
                        "default": Style::default().as_str(),
                        "description": "Visual style of the graphic: minimalist, mystical, or gradient"
                    }
                },
                "required": ["zodiac_sign"]
            }),
        }
    }

    async fn call(&self, args: HoroscopeArgs) -> ToolResult {
        match self.generate(&args).await {
            Ok(result) => result,
            Err(e) => {
                error!(sign = %args.zodiac_sign, error = %e, "horoscope generation failed");
                ToolResult::error(format!("Error: {e}"))
            }
        }
    }
}
