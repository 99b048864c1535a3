//! GAuthify API client library for Rust.
//!
//! A blocking client for the [GAuthify](https://www.gauthify.com) two-factor
//! authentication service: manage users, check one-time passwords and send
//! them by email, SMS or voice.
//!
//! Every request is tried against an ordered list of endpoints. Connection
//! problems and unexpected responses move on to the next endpoint, while
//! errors the API reports itself (bad key, bad parameters, ...) are returned
//! straight away as a [`GAuthifyError`].
//!
//! # Quick Start
//!
//! ```no_run
//! use gauthify_client::{CreateUserParams, GAuthify};
//!
//! let client = GAuthify::new("my-api-key").unwrap();
//!
//! let user = client
//!     .create_user(
//!         "user@example.com",
//!         "Example User",
//!         &CreateUserParams {
//!             email: Some("user@example.com".into()),
//!             ..Default::default()
//!         },
//!     )
//!     .unwrap();
//! client.send_email(&user.unique_id, None).unwrap();
//! ```

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod settings;

// Re-export the main public types at the crate root for convenience.
pub use client::GAuthify;
pub use dispatcher::{Dispatcher, Payload};
pub use error::{ErrorDetails, ErrorKind, GAuthifyError, Result, SUPPORT_SUFFIX};
pub use models::{CreateUserParams, OtpCheck, UpdateUserParams, User};
pub use settings::{ApiRevision, ClientConfig, DEFAULT_TIMEOUT};
