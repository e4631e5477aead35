use crate::model_service::InferenceError;
use ndarray::ArrayD;
use ort::{
    session::{builder::GraphOptimizationLevel, Session, SessionOutputs},
    tensor::PrimitiveTensorElementType,
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

/// Round-robin pool of ONNX sessions loaded from the same model file.
#[derive(Clone)]
pub struct SessionPool {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
}

impl SessionPool {
    pub fn new(model_path: &Path, num_instances: usize) -> Result<Self, InferenceError> {
        let num_instances = num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_path)?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions for {}",
            num_instances,
            model_path.display()
        );

        Ok(Self {
            counter: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(sessions),
        })
    }

    /// Runs `f` against the next session, holding its lock for the call.
    pub fn with_session<T, F>(&self, f: F) -> Result<T, InferenceError>
    where
        F: FnOnce(&mut Session) -> Result<T, InferenceError>,
    {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| InferenceError::SessionPoisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        f(&mut session)
    }
}

/// Copies a named output tensor into an owned array.
pub fn extract_array<T>(outputs: &SessionOutputs, name: &str) -> Result<ArrayD<T>, InferenceError>
where
    T: PrimitiveTensorElementType + std::fmt::Debug + Clone + 'static,
{
    let value = outputs
        .get(name)
        .ok_or_else(|| InferenceError::MissingOutput(name.to_string()))?;
    let (shape, data) = value.try_extract_tensor::<T>()?;
    let array = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())?;
    Ok(array)
}
