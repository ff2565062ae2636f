// ============================================================
// Layer 6 — Export Writer
// ============================================================
// Writes a trained model in the flat layout the downstream
// tagger reads:
//
//   <export_dir>/
//     tasks/<index>/
//       name      task name
//       dual      1 or 0
//       labels    one label per line, in index order
//       weights   "# <num_labels> <input_width>" then one row per label
//       biases    "# <num_labels>" then one row
//     encoder.name   transformer name
//     …              encoder graph files (EncoderGraphExporter)
//
// Weights are written [num_labels, input_width]; burn's Linear
// stores [input_width, num_labels] so the matrix is transposed.
// Every value is followed by a single space.
//
// Everything is written from a CPU (NdArray) copy of the model.

use anyhow::{Context, Result};
use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};
use burn::{
    backend::NdArray,
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::Serialize;

use crate::domain::Task;
use crate::ml::encoder::SharedEncoder;
use crate::ml::head::TaskHead;
use crate::ml::model::MultiTaskModel;

pub type CpuBackend = NdArray;

pub const ENCODER_NAME_FILE: &str = "encoder.name";

// ─── Encoder graph seam ───────────────────────────────────────────────────────
/// Serialises the shared encoder alone (no heads) with `token_ids`
/// as its only input and a dynamic sequence axis.
pub trait EncoderGraphExporter {
    fn export_encoder(&self, encoder: &SharedEncoder<CpuBackend>, dir: &Path) -> Result<()>;
}

/// Writes the encoder parameters as a full-precision named record
/// (`encoder.mpk`) plus a JSON description of its graph interface
/// (`encoder.json`).
pub struct RecordGraphExporter;

pub const ENCODER_RECORD: &str = "encoder";
pub const ENCODER_GRAPH_FILE: &str = "encoder.json";

#[derive(Debug, Serialize)]
struct GraphDescriptor {
    weights:       String,
    inputs:        Vec<GraphTensor>,
    outputs:       Vec<GraphTensor>,
    hidden_size:   usize,
    num_layers:    usize,
    max_positions: usize,
}

#[derive(Debug, Serialize)]
struct GraphTensor {
    name:  &'static str,
    dtype: &'static str,
    /// Axis sizes; dynamic axes are named
    shape: Vec<serde_json::Value>,
}

impl EncoderGraphExporter for RecordGraphExporter {
    fn export_encoder(&self, encoder: &SharedEncoder<CpuBackend>, dir: &Path) -> Result<()> {
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(encoder.clone().into_record(), dir.join(ENCODER_RECORD))
            .with_context(|| format!("Cannot write encoder record into '{}'", dir.display()))?;

        let sent_length = serde_json::json!("sent length");
        let descriptor = GraphDescriptor {
            weights: format!("{ENCODER_RECORD}.mpk"),
            inputs: vec![GraphTensor {
                name:  "token_ids",
                dtype: "int64",
                shape: vec![1.into(), sent_length.clone()],
            }],
            outputs: vec![GraphTensor {
                name:  "sequence_output",
                dtype: "float32",
                shape: vec![1.into(), sent_length, encoder.hidden_size.into()],
            }],
            hidden_size:   encoder.hidden_size,
            num_layers:    encoder.layers.len(),
            max_positions: encoder.max_positions,
        };
        write_file(&dir.join(ENCODER_GRAPH_FILE), &serde_json::to_string_pretty(&descriptor)?)
    }
}

// ─── ExportWriter ─────────────────────────────────────────────────────────────
pub struct ExportWriter<'a> {
    tasks:            &'a [Task],
    transformer_name: &'a str,
    graph:            Box<dyn EncoderGraphExporter>,
}

impl<'a> ExportWriter<'a> {
    pub fn new(tasks: &'a [Task], transformer_name: &'a str) -> Self {
        Self { tasks, transformer_name, graph: Box::new(RecordGraphExporter) }
    }

    pub fn with_graph_exporter(mut self, graph: Box<dyn EncoderGraphExporter>) -> Self {
        self.graph = graph;
        self
    }

    /// Export `model` into `dir`. `cpu_skeleton` must have the same
    /// architecture as `model`; its parameters are overwritten.
    ///
    /// The encoder files depend on the graph exporter: the default
    /// `RecordGraphExporter` writes `encoder.mpk` and `encoder.json`,
    /// and `encoder.onnx` only appears when an ONNX-writing
    /// `EncoderGraphExporter` is plugged in with `with_graph_exporter`.
    pub fn export<B: Backend>(
        &self,
        model:        &MultiTaskModel<B>,
        cpu_skeleton: MultiTaskModel<CpuBackend>,
        dir:          &Path,
    ) -> Result<()> {
        let cpu = to_cpu(model, cpu_skeleton)?;

        let task_root = dir.join("tasks");
        fs::create_dir_all(&task_root)
            .with_context(|| format!("Cannot create export directory '{}'", task_root.display()))?;

        for (index, task) in self.tasks.iter().enumerate() {
            let head = cpu.head(task.task_id)?;
            export_task(head, task, &task_dir(dir, index))?;
        }

        self.graph.export_encoder(&cpu.encoder, dir)?;
        write_file(&dir.join(ENCODER_NAME_FILE), &format!("{}\n", self.transformer_name))?;

        tracing::info!("Exported {} task heads and the encoder to '{}'", self.tasks.len(), dir.display());
        Ok(())
    }
}

/// Copy every parameter of `model` into a CPU-resident model.
pub fn to_cpu<B: Backend>(
    model:    &MultiTaskModel<B>,
    skeleton: MultiTaskModel<CpuBackend>,
) -> Result<MultiTaskModel<CpuBackend>> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let bytes = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
        .context("Cannot serialise model for CPU export")?;
    let record = Recorder::<CpuBackend>::load(&recorder, bytes, &Default::default())
        .context("Cannot rebuild model on the CPU")?;
    Ok(skeleton.load_record(record))
}

fn export_task(head: &TaskHead<CpuBackend>, task: &Task, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;

    let labels: String = task.labels.iter().map(|l| format!("{l}\n")).collect();
    write_file(&dir.join("name"),   &format!("{}\n", task.name))?;
    write_file(&dir.join("dual"),   if task.dual_mode { "1\n" } else { "0\n" })?;
    write_file(&dir.join("labels"), &labels)?;
    write_file(&dir.join("weights"), &format_weights(head)?)?;
    write_file(&dir.join("biases"),  &format_biases(head)?)
}

pub fn format_weights<B: Backend>(head: &TaskHead<B>) -> Result<String> {
    // [input_width, num_labels] → [num_labels, input_width]
    let weight = head.classifier.weight.val().transpose();
    let [rows, cols] = weight.dims();
    let values = float_values(weight.into_data())?;

    let mut out = format!("# {rows} {cols}\n");
    for row in values.chunks(cols.max(1)) {
        for v in row {
            let _ = write!(out, "{v} ");
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn format_biases<B: Backend>(head: &TaskHead<B>) -> Result<String> {
    let values = match &head.classifier.bias {
        Some(bias) => float_values(bias.val().into_data())?,
        None => vec![0.0; head.num_labels],
    };

    let mut out = format!("# {}\n", values.len());
    for v in &values {
        let _ = write!(out, "{v} ");
    }
    out.push('\n');
    Ok(out)
}

fn float_values(data: TensorData) -> Result<Vec<f32>> {
    data.to_vec::<f32>().map_err(|e| anyhow::anyhow!("Cannot read head parameters: {e:?}"))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Cannot write '{}'", path.display()))
}

pub fn task_dir(export_dir: &Path, index: usize) -> PathBuf {
    export_dir.join("tasks").join(index.to_string())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LabelVocab;
    use crate::ml::model::tests::tiny_model;
    use burn::module::Param;

    fn task(task_id: usize, name: &str, dual_mode: bool, labels: &[&str]) -> Task {
        Task {
            task_id,
            name: name.to_string(),
            dual_mode,
            labels: LabelVocab::new(labels.iter().map(|l| l.to_string()).collect()),
            train: vec![], dev: vec![], test: vec![],
        }
    }

    #[test]
    fn test_weights_are_written_label_major() {
        let device = Default::default();
        let mut model = tiny_model(&device);
        // [input_width=8, num_labels=3], value = 10 * in + out
        let values: Vec<f32> = (0..8).flat_map(|i| (0..3).map(move |o| (10 * i + o) as f32)).collect();
        model.heads[0].classifier.weight =
            Param::from_tensor(Tensor::from_data(TensorData::new(values, [8, 3]), &device));

        let text = format_weights(&model.heads[0]).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("# 3 8"));
        assert_eq!(lines.next(), Some("0 10 20 30 40 50 60 70 "));
        assert_eq!(lines.next(), Some("1 11 21 31 41 51 61 71 "));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn test_fresh_biases_are_zero() {
        let device = Default::default();
        let model = tiny_model(&device);
        assert_eq!(format_biases(&model.heads[1]).unwrap(), "# 5\n0 0 0 0 0 \n");
    }

    #[test]
    fn test_export_layout() {
        let device = Default::default();
        let tmp = tempfile::tempdir().unwrap();
        let tasks = vec![task(0, "POS", false, &["DT", "NN", "VB"]), task(1, "Deps Label", true, &["a", "b", "c", "d", "e"])];
        let model = tiny_model(&device);

        ExportWriter::new(&tasks, "roberta-base")
            .export(&model, tiny_model(&device), tmp.path())
            .unwrap();

        let read = |p: PathBuf| fs::read_to_string(p).unwrap();
        assert_eq!(read(task_dir(tmp.path(), 0).join("name")), "POS\n");
        assert_eq!(read(task_dir(tmp.path(), 0).join("dual")), "0\n");
        assert_eq!(read(task_dir(tmp.path(), 0).join("labels")), "DT\nNN\nVB\n");
        assert_eq!(read(task_dir(tmp.path(), 1).join("dual")), "1\n");
        assert!(read(task_dir(tmp.path(), 1).join("weights")).starts_with("# 5 16\n"));
        assert_eq!(read(tmp.path().join(ENCODER_NAME_FILE)), "roberta-base\n");
        assert!(tmp.path().join(format!("{ENCODER_RECORD}.mpk")).is_file());

        let graph: serde_json::Value = serde_json::from_str(&read(tmp.path().join(ENCODER_GRAPH_FILE))).unwrap();
        assert_eq!(graph["inputs"][0]["name"], "token_ids");
        assert_eq!(graph["inputs"][0]["shape"][1], "sent length");
        assert_eq!(graph["outputs"][0]["shape"][2], 8);
    }

    #[test]
    fn test_custom_graph_exporter_is_used() {
        struct Marker;
        impl EncoderGraphExporter for Marker {
            fn export_encoder(&self, _: &SharedEncoder<CpuBackend>, dir: &Path) -> Result<()> {
                write_file(&dir.join("encoder.onnx"), "graph")
            }
        }

        let device = Default::default();
        let tmp = tempfile::tempdir().unwrap();
        let tasks = vec![task(0, "POS", false, &["DT", "NN", "VB"])];

        ExportWriter::new(&tasks, "roberta-base")
            .with_graph_exporter(Box::new(Marker))
            .export(&tiny_model(&device), tiny_model(&device), tmp.path())
            .unwrap();
        assert!(tmp.path().join("encoder.onnx").is_file());
        assert!(!tmp.path().join(ENCODER_GRAPH_FILE).exists());
    }
}
