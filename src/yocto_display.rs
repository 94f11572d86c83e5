//! Yocto-MaxiDisplay driven through a VirtualHub/YoctoHub HTTP API.
//!
//! Display commands are short strings posted to the device's `command`
//! attribute. Layer commands start with the layer number; text and font
//! arguments are terminated by ESC.

use anyhow::Context;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

pub const LARGE_FONT: &str = "Large.yfm";
pub const MEDIUM_FONT: &str = "Medium.yfm";

const ESC: char = '\x1b';

/// Text anchor points understood by the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Align {
    TopLeft = 0,
    CenterLeft = 1,
    BaselineLeft = 2,
    BottomLeft = 3,
    TopCenter = 4,
    Center = 5,
    BaselineCenter = 6,
    BottomCenter = 7,
}

/// What the display loop needs from a screen.
#[allow(async_fn_in_trait)]
pub trait Display {
    async fn is_online(&self) -> bool;

    /// Width and height in pixels.
    async fn size(&self) -> anyhow::Result<(u32, u32)>;

    async fn reset_all(&mut self) -> anyhow::Result<()>;

    async fn clear(&mut self) -> anyhow::Result<()>;

    async fn select_font(&mut self, font: &str) -> anyhow::Result<()>;

    async fn draw_text(&mut self, x: u32, y: u32, align: Align, text: &str)
        -> anyhow::Result<()>;
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YellowPagesEntry {
    pub hardware_id: String,
    #[serde(default)]
    pub logical_name: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    pub display_width: u32,
    pub display_height: u32,
}

/// Layer 0 of the first display found on a hub.
pub struct YoctoDisplay {
    device_url: String,
    client: reqwest::Client,
    layer: u8,
    /// Layer commands queued until the next drawing command.
    pending: String,
}

impl YoctoDisplay {
    /// Registers with the hub and picks the first display it knows about.
    /// `Ok(None)` when the hub answers but has no display attached.
    pub async fn first_display(hub_url: &str) -> anyhow::Result<Option<Self>> {
        let hub_url = hub_url.trim_end_matches('/');
        let client = reqwest::Client::new();
        let yellow_pages: HashMap<String, Vec<YellowPagesEntry>> = client
            .get(format!("{hub_url}/api/services/yellowPages.json"))
            .send()
            .await
            .with_context(|| format!("Unable to connect to {hub_url}"))?
            .error_for_status()?
            .json()
            .await?;

        let Some(entry) = yellow_pages.get("Display").and_then(|d| d.first()) else {
            return Ok(None);
        };
        let serial = entry
            .hardware_id
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();
        info!("Using display {serial} on {hub_url}");

        Ok(Some(Self {
            device_url: format!("{hub_url}/bySerial/{serial}/api"),
            client,
            layer: 0,
            pending: String::new(),
        }))
    }

    async fn state(&self) -> anyhow::Result<DisplayState> {
        let state = self
            .client
            .get(format!("{}/display.json", self.device_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(state)
    }

    async fn send_command(&self, command: &str) -> anyhow::Result<()> {
        debug!("Display command {command:?}");
        self.client
            .get(format!("{}/display", self.device_url))
            .query(&[("command", command)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn push(&mut self, command: &str) {
        self.pending.push_str(command);
    }

    async fn flush(&mut self, command: &str) -> anyhow::Result<()> {
        let batch = format!("{}{}{}", self.layer, self.pending, command);
        self.pending.clear();
        self.send_command(&batch).await
    }
}

impl Display for YoctoDisplay {
    async fn is_online(&self) -> bool {
        self.state().await.is_ok()
    }

    async fn size(&self) -> anyhow::Result<(u32, u32)> {
        let state = self.state().await?;
        Ok((state.display_width, state.display_height))
    }

    async fn reset_all(&mut self) -> anyhow::Result<()> {
        self.pending.clear();
        self.send_command("Z").await
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        self.pending.clear();
        self.flush("x").await
    }

    async fn select_font(&mut self, font: &str) -> anyhow::Result<()> {
        self.push(&format!("&{font}{ESC}"));
        Ok(())
    }

    async fn draw_text(
        &mut self,
        x: u32,
        y: u32,
        align: Align,
        text: &str,
    ) -> anyhow::Result<()> {
        self.flush(&format!("T{x},{y},{},{text}{ESC}", align as u8))
            .await
    }
}
