//! # cistat-poller
//!
//! The polling loop that turns CI server state into metrics.
//!
//! State between iterations is an explicit [`PollState`] value: it goes into
//! [`Poller::poll_once`] and comes back out in the returned [`Iteration`].
//!
//! # Example
//!
//! ```no_run
//! use cistat_core::Settings;
//! use cistat_graphite::GraphiteSender;
//! use cistat_poller::{PollState, Poller};
//! use cistat_teamcity::TeamCityClient;
//! use std::path::Path;
//!
//! # async fn example() -> cistat_core::Result<()> {
//! let settings = Settings::load(Path::new("config.yml"))?;
//! let ci = TeamCityClient::from_settings(&settings)?;
//! let sink = GraphiteSender::from_settings(&settings);
//!
//! let poller = Poller::new(&settings, ci, sink);
//! poller.run(PollState::starting_now()).await;
//! # Ok(())
//! # }
//! ```

mod poller;
mod state;

pub use poller::Poller;
pub use state::{Iteration, IterationReport, PollState};
