// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod backend;
pub mod feedback;
pub mod forms;
pub mod ids;
pub mod model;
pub mod session;

pub use backend::*;
pub use feedback::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use session::*;
