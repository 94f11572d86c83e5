use crate::error::{Error, Result};
use crate::format::format_watts;
use crate::gateway::GatewayApi;
use crate::telemetry::{fetch_reading, Reading};
use crate::yocto_display::{Align, Display, LARGE_FONT, MEDIUM_FONT};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Renders one reading: available power large in the upper third, production
/// in brackets in the lower third.
pub async fn render<D: Display>(display: &mut D, size: (u32, u32), reading: &Reading) -> Result<()> {
    let (width, height) = size;
    let draw = async {
        display.clear().await?;
        display.select_font(LARGE_FONT).await?;
        display
            .draw_text(
                width / 2,
                height / 3,
                Align::Center,
                &format_watts(reading.available_watts()),
            )
            .await?;
        display.select_font(MEDIUM_FONT).await?;
        display
            .draw_text(
                width / 2,
                height * 2 / 3,
                Align::Center,
                &format!("({})", format_watts(reading.production_watts)),
            )
            .await
    };
    draw.await
        .map_err(|e: anyhow::Error| Error::Hardware(format!("{e:#}")))
}

/// Polls the gateway and refreshes the display until the display goes
/// offline. The first fetch or render failure ends the loop.
pub async fn run<A, D>(session: &A, display: &mut D, interval: Duration) -> Result<()>
where
    A: GatewayApi,
    D: Display,
{
    let size = display
        .size()
        .await
        .map_err(|e| Error::Hardware(format!("Can't read display size: {e:#}")))?;
    info!("Display is {}x{}, refreshing every {interval:?}", size.0, size.1);

    while display.is_online().await {
        let reading = fetch_reading(session).await?;
        debug!("Available {}W", reading.available_watts());
        render(display, size, &reading).await?;
        sleep(interval).await;
    }

    info!("Display went offline, stopping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Default)]
    struct RecordingDisplay {
        online_checks_left: Cell<u32>,
        commands: Vec<String>,
    }

    impl Display for RecordingDisplay {
        async fn is_online(&self) -> bool {
            let left = self.online_checks_left.get();
            self.online_checks_left.set(left.saturating_sub(1));
            left > 0
        }

        async fn size(&self) -> anyhow::Result<(u32, u32)> {
            Ok((128, 64))
        }

        async fn reset_all(&mut self) -> anyhow::Result<()> {
            self.commands.push("reset".to_string());
            Ok(())
        }

        async fn clear(&mut self) -> anyhow::Result<()> {
            self.commands.push("clear".to_string());
            Ok(())
        }

        async fn select_font(&mut self, font: &str) -> anyhow::Result<()> {
            self.commands.push(format!("font {font}"));
            Ok(())
        }

        async fn draw_text(
            &mut self,
            x: u32,
            y: u32,
            align: Align,
            text: &str,
        ) -> anyhow::Result<()> {
            self.commands.push(format!("text {x},{y},{align:?} {text}"));
            Ok(())
        }
    }

    struct SequenceGateway {
        documents: Vec<serde_json::Value>,
        calls: Cell<usize>,
    }

    impl GatewayApi for SequenceGateway {
        async fn login(&mut self, _token: &str) -> anyhow::Result<bool> {
            Ok(true)
        }

        async fn api_call(&self, _path: &str) -> anyhow::Result<serde_json::Value> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            self.documents
                .get(call)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection reset"))
        }
    }

    fn document(production: f64, consumption: f64) -> serde_json::Value {
        json!({
            "production": [{ "type": "inverters", "wNow": production }],
            "consumption": [{ "type": "eim", "measurementType": "net-consumption", "wNow": consumption }]
        })
    }

    #[tokio::test]
    async fn test_render_layout() {
        let mut display = RecordingDisplay::default();
        let reading = Reading {
            production_watts: 3500.0,
            consumption_watts: 1200.0,
        };
        render(&mut display, (128, 64), &reading).await.unwrap();
        assert_eq!(
            display.commands,
            vec![
                "clear",
                "font Large.yfm",
                "text 64,21,Center 2.3 W",
                "font Medium.yfm",
                "text 64,42,Center (3.5 W)",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_display_goes_offline() {
        let gateway = SequenceGateway {
            documents: vec![document(800.0, 300.0), document(750.0, 900.0)],
            calls: Cell::new(0),
        };
        let mut display = RecordingDisplay {
            online_checks_left: Cell::new(2),
            ..Default::default()
        };

        let started = tokio::time::Instant::now();
        run(&gateway, &mut display, REFRESH_INTERVAL).await.unwrap();

        assert_eq!(gateway.calls.get(), 2);
        assert!(started.elapsed() >= REFRESH_INTERVAL * 2);
        let texts: Vec<_> = display
            .commands
            .iter()
            .filter(|c| c.starts_with("text"))
            .collect();
        assert_eq!(
            texts,
            vec![
                "text 64,21,Center 500 W",
                "text 64,42,Center (800 W)",
                "text 64,21,Center -150 W",
                "text 64,42,Center (750 W)",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_ends_loop() {
        let gateway = SequenceGateway {
            documents: vec![document(800.0, 300.0)],
            calls: Cell::new(0),
        };
        let mut display = RecordingDisplay {
            online_checks_left: Cell::new(10),
            ..Default::default()
        };

        let err = run(&gateway, &mut display, REFRESH_INTERVAL)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert_eq!(gateway.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_offline_display_never_polls() {
        let gateway = SequenceGateway {
            documents: vec![],
            calls: Cell::new(0),
        };
        let mut display = RecordingDisplay::default();

        run(&gateway, &mut display, REFRESH_INTERVAL).await.unwrap();
        assert_eq!(gateway.calls.get(), 0);
        assert!(display.commands.is_empty());
    }
}
