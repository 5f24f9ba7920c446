//! External service integrations.

pub mod fraud_client {
    pub use crate::fraud_client::*;
}

pub mod courier_client {
    pub use crate::courier_client::*;
}

pub mod credentials {
    pub use crate::credentials::*;
}

pub mod order_store {
    pub use crate::order_store::*;
}
