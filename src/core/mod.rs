// Domain-layer modules and shared errors/models
pub mod mapper {
    pub use crate::mapper::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod reconciler {
    pub use crate::reconciler::*;
}

pub mod errors {
    pub use crate::errors::*;
}
