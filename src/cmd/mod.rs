//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `serve`    | `Serve`          |
//! | `register` | `Register`       |

pub mod register;
pub mod serve;

pub use register::cmd_register;
pub use serve::cmd_serve;
