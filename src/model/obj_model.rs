//! Wavefront OBJ backed [`Model`]
//!
//! Meshes are loaded with `tobj` on a worker thread. Progress is reported per
//! mesh over a channel that the UI thread drains from [`Model::poll_progress`].

use std::{
    io::BufReader,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
};

use cgmath::{InnerSpace, Vector3};
use log::{debug, info, warn};

use super::{
    BoundingBox, MeshPreparationProgress, Model, ModelError, PreparationStatus, PreparedMesh,
};

const DEFAULT_MESH_COLOR: [f32; 3] = [0.72, 0.72, 0.75];

/// Where the OBJ text comes from
#[derive(Debug, Clone)]
enum ObjSource {
    File(PathBuf),
    Memory { name: String, text: String },
}

impl ObjSource {
    fn name(&self) -> String {
        match self {
            ObjSource::File(path) => path.display().to_string(),
            ObjSource::Memory { name, .. } => name.clone(),
        }
    }
}

enum WorkerMessage {
    Progress(f32),
    Done(Result<Vec<PreparedMesh>, ModelError>),
}

pub struct ObjModel {
    source: ObjSource,
    meshes: Vec<PreparedMesh>,
    bbox: BoundingBox,
    receiver: Option<Receiver<WorkerMessage>>,
    cancel: Arc<AtomicBool>,
    ready: bool,
    generation: u64,
}

impl ObjModel {
    /// Model backed by an OBJ file on disk. Nothing is read until
    /// [`Model::prepare`] is called.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_source(ObjSource::File(path.into()))
    }

    /// Model backed by OBJ text already in memory
    pub fn from_obj_text(name: &str, text: impl Into<String>) -> Self {
        Self::with_source(ObjSource::Memory {
            name: name.to_owned(),
            text: text.into(),
        })
    }

    fn with_source(source: ObjSource) -> Self {
        Self {
            source,
            meshes: Vec::new(),
            bbox: BoundingBox::empty(),
            receiver: None,
            cancel: Arc::new(AtomicBool::new(false)),
            ready: false,
            generation: 0,
        }
    }

    pub fn name(&self) -> String {
        self.source.name()
    }

    pub fn is_preparing(&self) -> bool {
        self.receiver.is_some()
    }

    fn finish(&mut self, result: Result<Vec<PreparedMesh>, ModelError>) -> MeshPreparationProgress {
        self.receiver = None;
        match result {
            Ok(meshes) => {
                self.bbox = meshes
                    .iter()
                    .fold(BoundingBox::empty(), |acc, m| acc.union(&m.bounding_box()));
                let triangles: usize = meshes.iter().map(PreparedMesh::triangle_count).sum();
                info!(
                    "Prepared '{}': {} meshes, {} triangles",
                    self.source.name(),
                    meshes.len(),
                    triangles
                );
                self.meshes = meshes;
                self.ready = true;
                self.generation += 1;
                MeshPreparationProgress::succeeded()
            }
            Err(ModelError::Cancelled) => {
                info!("Preparation of '{}' cancelled", self.source.name());
                MeshPreparationProgress {
                    mesh_progress: 0.0,
                    status: PreparationStatus::Cancelled,
                }
            }
            Err(err) => {
                warn!("Preparation of '{}' failed: {}", self.source.name(), err);
                MeshPreparationProgress {
                    mesh_progress: 0.0,
                    status: PreparationStatus::Failed(err.to_string()),
                }
            }
        }
    }
}

impl Model for ObjModel {
    fn prepare(&mut self) {
        if self.ready || self.receiver.is_some() {
            return;
        }

        let (sender, receiver) = mpsc::channel();
        let source = self.source.clone();
        self.cancel = Arc::new(AtomicBool::new(false));
        let cancel = self.cancel.clone();

        debug!("Spawning mesh preparation for '{}'", source.name());
        thread::spawn(move || {
            let progress_sender = sender.clone();
            let result = prepare_meshes(&source, &cancel, |fraction| {
                // The receiver may already be gone if the model was dropped.
                let _ = progress_sender.send(WorkerMessage::Progress(fraction));
            });
            let _ = sender.send(WorkerMessage::Done(result));
        });

        self.receiver = Some(receiver);
    }

    fn cancel_preparation(&mut self) {
        if self.receiver.is_some() {
            self.cancel.store(true, Ordering::Relaxed);
        }
    }

    fn is_ready_for_rendering(&self) -> bool {
        self.ready
    }

    fn poll_progress(&mut self) -> Vec<MeshPreparationProgress> {
        let mut events = Vec::new();
        loop {
            let Some(receiver) = self.receiver.as_ref() else {
                break;
            };
            match receiver.try_recv() {
                Ok(WorkerMessage::Progress(fraction)) => {
                    events.push(MeshPreparationProgress::in_progress(fraction));
                }
                Ok(WorkerMessage::Done(result)) => {
                    events.push(self.finish(result));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.push(self.finish(Err(ModelError::WorkerLost)));
                }
            }
        }
        events
    }

    fn meshes(&self) -> &[PreparedMesh] {
        &self.meshes
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Loads and converts every mesh of `source`, checking `cancel` between meshes
fn prepare_meshes(
    source: &ObjSource,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(f32),
) -> Result<Vec<PreparedMesh>, ModelError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(ModelError::Cancelled);
    }

    let loaded = match source {
        ObjSource::File(path) => tobj::load_obj(path, &load_options()),
        ObjSource::Memory { text, .. } => {
            let mut reader = BufReader::new(text.as_bytes());
            tobj::load_obj_buf(&mut reader, &load_options(), |_| {
                Err(tobj::LoadError::OpenFileFailed)
            })
        }
    };
    let (models, materials) = loaded.map_err(|source_err| ModelError::Load {
        path: source.name(),
        source: source_err,
    })?;
    let materials = materials.unwrap_or_else(|err| {
        debug!("No materials for '{}': {}", source.name(), err);
        Vec::new()
    });

    let total = models.len().max(1) as f32;
    let mut meshes = Vec::with_capacity(models.len());
    for (index, model) in models.into_iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(ModelError::Cancelled);
        }

        let color = model
            .mesh
            .material_id
            .and_then(|id| materials.get(id))
            .and_then(|material| material.diffuse)
            .unwrap_or(DEFAULT_MESH_COLOR);

        let mesh = convert_mesh(model.name, &model.mesh, color);
        if mesh.triangle_count() > 0 {
            meshes.push(mesh);
        }
        on_progress((index + 1) as f32 / total);
    }

    if meshes.is_empty() {
        return Err(ModelError::NoGeometry(source.name()));
    }
    Ok(meshes)
}

fn convert_mesh(name: String, mesh: &tobj::Mesh, color: [f32; 3]) -> PreparedMesh {
    let positions: Vec<[f32; 3]> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();

    let normals = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect()
    } else {
        vertex_normals(&positions, &mesh.indices)
    };

    PreparedMesh {
        name,
        positions,
        normals,
        indices: mesh.indices.clone(),
        color,
    }
}

/// Averages area-weighted face normals onto vertices
fn vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accumulated = vec![Vector3::new(0.0f32, 0.0, 0.0); positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let pa = Vector3::from(positions[a]);
        let pb = Vector3::from(positions[b]);
        let pc = Vector3::from(positions[c]);
        let face = (pb - pa).cross(pc - pa);
        for i in [a, b, c] {
            accumulated[i] += face;
        }
    }

    accumulated
        .into_iter()
        .map(|n| {
            if n.magnitude2() > 0.0 {
                n.normalize().into()
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const TETRAHEDRON: &str = "\
o tetra
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
f 1 3 2
f 1 2 4
f 1 4 3
f 2 3 4
";

    const QUAD: &str = "\
o quad
v 0 0 0
v 2 0 0
v 2 2 0
v 0 2 0
f 1 2 3 4
";

    fn memory(text: &str) -> ObjSource {
        ObjSource::Memory {
            name: "test".to_owned(),
            text: text.to_owned(),
        }
    }

    fn wait_for_outcome(model: &mut ObjModel) -> Vec<MeshPreparationProgress> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(model.poll_progress());
            if events.last().map_or(false, |e| e.status != PreparationStatus::InProgress) {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("mesh preparation did not finish");
    }

    #[test]
    fn test_prepare_meshes_triangulates_and_reports_progress() {
        let cancel = AtomicBool::new(false);
        let mut reported = Vec::new();
        let meshes = prepare_meshes(&memory(QUAD), &cancel, |p| reported.push(p)).unwrap();

        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].triangle_count(), 2);
        assert_eq!(meshes[0].normals.len(), meshes[0].positions.len());
        assert_eq!(reported, vec![1.0]);
    }

    #[test]
    fn test_generated_normals_point_out_of_the_quad() {
        let cancel = AtomicBool::new(false);
        let meshes = prepare_meshes(&memory(QUAD), &cancel, |_| {}).unwrap();
        for normal in &meshes[0].normals {
            assert!((normal[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_prepare_meshes_honours_cancel_flag() {
        let cancel = AtomicBool::new(true);
        let result = prepare_meshes(&memory(TETRAHEDRON), &cancel, |_| {});
        assert!(matches!(result, Err(ModelError::Cancelled)));
    }

    #[test]
    fn test_prepare_meshes_rejects_empty_model() {
        let cancel = AtomicBool::new(false);
        let result = prepare_meshes(&memory("o nothing\nv 0 0 0\n"), &cancel, |_| {});
        assert!(matches!(result, Err(ModelError::NoGeometry(_))));
    }

    #[test]
    fn test_model_becomes_ready_after_preparation() {
        let mut model = ObjModel::from_obj_text("tetra", TETRAHEDRON);
        assert!(!model.is_ready_for_rendering());
        assert_eq!(model.generation(), 0);

        model.prepare();
        assert!(model.is_preparing());
        let events = wait_for_outcome(&mut model);

        assert!(events.last().unwrap().did_succeed());
        assert!(model.is_ready_for_rendering());
        assert_eq!(model.generation(), 1);
        assert_eq!(model.meshes().len(), 1);

        let bbox = model.bounding_box();
        assert_eq!(bbox.min, cgmath::Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bbox.max, cgmath::Point3::new(1.0, 1.0, 1.0));

        // Preparing again is a no-op once ready.
        model.prepare();
        assert!(!model.is_preparing());
        assert_eq!(model.generation(), 1);
    }

    #[test]
    fn test_missing_file_reports_failure() {
        let mut model = ObjModel::open("/nonexistent/definitely/missing.obj");
        model.prepare();
        let events = wait_for_outcome(&mut model);

        assert!(matches!(
            events.last().unwrap().status,
            PreparationStatus::Failed(_)
        ));
        assert!(!model.is_ready_for_rendering());
    }
}
