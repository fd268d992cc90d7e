use std::{future::Future, sync::Arc};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Password};
use tokio::sync::watch;
use weather_core::{
    Config, Coordinates, FixedLocation, LoadState, LocationAcquirer, LocationSource, ProxyClient,
    ViewController, proxy,
};

use crate::{location::PromptLocation, render::render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather at your location")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key in the config file.
    Configure,

    /// Run the weather proxy.
    Serve {
        /// Listen address, e.g. "0.0.0.0:3000". Defaults to the config value.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show the current weather once.
    Show(ClientArgs),

    /// Show the current weather and offer to refresh until declined.
    Watch(ClientArgs),
}

#[derive(Debug, Args)]
pub struct ClientArgs {
    /// Latitude in decimal degrees.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude in decimal degrees.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Ask for the position interactively.
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    ask: bool,

    /// Proxy base URL. Defaults to the config value.
    #[arg(long)]
    proxy: Option<String>,
}

impl ClientArgs {
    /// Flags first, then the prompt, then the configured fallback. Nothing at
    /// all means no location capability.
    fn location_source(&self, config: &Config) -> Option<Arc<dyn LocationSource>> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Some(Arc::new(FixedLocation(Coordinates::new(lat, lon))));
        }
        if self.ask {
            return Some(Arc::new(PromptLocation));
        }
        config
            .location
            .map(|coords| Arc::new(FixedLocation(coords)) as Arc<dyn LocationSource>)
    }

    fn controller(&self, config: &Config) -> ViewController<ProxyClient> {
        let proxy_url = self.proxy.clone().unwrap_or_else(|| config.proxy_url.clone());
        tracing::debug!(%proxy_url, "using weather proxy");

        ViewController::new(
            LocationAcquirer::new(self.location_source(config)),
            ProxyClient::new(proxy_url),
        )
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(config).await?,
            Command::Serve { bind } => {
                if let Some(bind) = bind {
                    config.bind = bind;
                }
                proxy::serve(&config).await?;
            }
            Command::Show(args) => {
                let view = args.controller(&config);
                let mut rx = view.subscribe();
                drive(&mut rx, view.start()).await;
            }
            Command::Watch(args) => {
                let view = args.controller(&config);
                let mut rx = view.subscribe();
                drive(&mut rx, view.start()).await;

                while ask_refresh().await? {
                    drive(&mut rx, view.refresh()).await;
                }
            }
        }

        Ok(())
    }
}

async fn configure(mut config: Config) -> anyhow::Result<()> {
    let key = tokio::task::spawn_blocking(|| {
        Password::new("OpenWeather API key:")
            .without_confirmation()
            .with_help_message("Stored in the config file; OPENWEATHER_API_KEY overrides it")
            .prompt()
    })
    .await?
    .context("Failed to read API key")?;

    config.set_api_key(key);
    config.save()?;
    println!("Saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn ask_refresh() -> anyhow::Result<bool> {
    let answer = tokio::task::spawn_blocking(|| {
        Confirm::new("Refresh?").with_default(true).prompt()
    })
    .await?;

    match answer {
        Ok(again) => Ok(again),
        Err(inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted) => {
            Ok(false)
        }
        Err(err) => Err(err).context("Failed to read answer"),
    }
}

/// Run `cycle` to completion, printing the states it publishes on the way.
///
/// The receiver holds only the latest state, so a step the cycle passes
/// through without yielding (e.g. `Locating` with a fixed position) is not
/// printed. The controller logs every transition at debug level.
async fn drive<F: Future>(rx: &mut watch::Receiver<LoadState>, cycle: F) {
    tokio::pin!(cycle);

    loop {
        tokio::select! {
            _ = &mut cycle => break,
            Ok(()) = rx.changed() => print_state(&rx.borrow_and_update()),
        }
    }

    if rx.has_changed().unwrap_or(false) {
        print_state(&rx.borrow_and_update());
    }
}

fn print_state(state: &LoadState) {
    if let Some(text) = render(state) {
        println!("{text}\n");
    }
}
