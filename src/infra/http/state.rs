use crate::application::RoutingEngine;

#[derive(Clone)]
pub struct HttpState {
    pub engine: RoutingEngine,
}

impl HttpState {
    pub fn new(engine: RoutingEngine) -> Self {
        Self { engine }
    }
}
