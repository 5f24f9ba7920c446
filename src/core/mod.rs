// Domain-layer modules and shared errors/models
pub mod risk {
    pub use crate::risk::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod fulfillment {
    pub use crate::fulfillment::*;
}

pub mod orchestrator {
    pub use crate::orchestrator::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
