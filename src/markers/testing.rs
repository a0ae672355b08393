use async_trait::async_trait;
use geojson::Feature;
use std::sync::{Arc, Mutex};

use super::error::MarkerError;
use super::service::{MarkerId, MarkerService, Token};

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub tokens: usize,
    pub adds: Vec<Feature>,
    pub modifies: Vec<(MarkerId, Feature)>,
    pub deletes: Vec<MarkerId>,
    pub failed_deletes: usize,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    calls: Calls,
    fail_adds: bool,
    fail_modifies: bool,
    fail_deletes: bool,
    fixed_id: Option<String>,
}

/// Recording in-memory marker service.
#[derive(Debug, Clone, Default)]
pub struct MockMarkerService {
    state: Arc<Mutex<State>>,
}

impl MockMarkerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fail_adds(&self, fail: bool) {
        self.state.lock().unwrap().fail_adds = fail;
    }

    pub fn fail_modifies(&self, fail: bool) {
        self.state.lock().unwrap().fail_modifies = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }

    /// Answer every add with the same id.
    pub fn always_return_id(&self, id: &str) {
        self.state.lock().unwrap().fixed_id = Some(id.to_string());
    }
}

fn refused(what: &str) -> MarkerError {
    MarkerError::InvalidResponse(format!("{what} refused"))
}

#[async_trait]
impl MarkerService for MockMarkerService {
    async fn get_token(&self) -> Result<Token, MarkerError> {
        self.state.lock().unwrap().calls.tokens += 1;
        Ok(Token("token".into()))
    }

    async fn add_marker(&self, _token: &Token, feature: &Feature) -> Result<MarkerId, MarkerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_adds {
            return Err(refused("add"));
        }
        state.next_id += 1;
        state.calls.adds.push(feature.clone());
        let id = match &state.fixed_id {
            Some(id) => id.clone(),
            None => state.next_id.to_string(),
        };
        Ok(MarkerId(id))
    }

    async fn modify_marker(
        &self,
        _token: &Token,
        feature: &Feature,
        id: &MarkerId,
    ) -> Result<(), MarkerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_modifies {
            return Err(refused("modify"));
        }
        state.calls.modifies.push((id.clone(), feature.clone()));
        Ok(())
    }

    async fn delete_marker(&self, _token: &Token, id: &MarkerId) -> Result<(), MarkerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            state.calls.failed_deletes += 1;
            return Err(refused("delete"));
        }
        state.calls.deletes.push(id.clone());
        Ok(())
    }
}
