//! Auth-domain identifiers, credentials, and token inspection.

pub mod identity;
pub mod inspector;
pub mod login;
pub mod token;

pub use identity::*;
pub use inspector::*;
pub use login::{LoginRequest, Registration};
pub use token::{credential::*, secret::*};
