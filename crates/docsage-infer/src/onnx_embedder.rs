//! ONNX-based embedding engine for SentenceTransformers models.
//!
//! Loads `model.onnx` and `tokenizer.json` from a model directory (for
//! example an export of multilingual-e5-small). Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use async_trait::async_trait;
    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::info;

    use docsage_core::{Capability, Error, Result};

    use crate::embedder::{l2_normalize, Embedder};

    /// Maximum sequence length for the model.
    const MAX_SEQ_LEN: usize = 512;

    /// ONNX embedding engine.
    pub struct OnnxEmbedder {
        session: Arc<Mutex<Session>>,
        tokenizer: Arc<Tokenizer>,
        model_dir: PathBuf,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load an ONNX model and tokenizer from the given directory.
        ///
        /// Expects:
        /// - `model_dir/model.onnx`: the ONNX model file
        /// - `model_dir/tokenizer.json`: the HuggingFace tokenizer
        pub fn load(model_dir: &Path, dimension: usize) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::Config(format!("Model not found: {}", model_path.display())));
            }
            if !tokenizer_path.exists() {
                return Err(Error::Config(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.so
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Config(format!("Failed to create session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Config(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Config(format!("Failed to load ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Config(format!("Failed to load tokenizer: {}", e)))?;

            info!(dim = dimension, model = %model_path.display(), "ONNX embedder loaded");

            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                tokenizer: Arc::new(tokenizer),
                model_dir: model_dir.to_path_buf(),
                dimension,
            })
        }
    }

    fn fail(message: impl std::fmt::Display) -> Error {
        Error::capability(Capability::Embedding, message.to_string())
    }

    /// Tokenize, run the session, mean-pool and normalize one text.
    fn infer(session: &Mutex<Session>, tokenizer: &Tokenizer, text: &str) -> Result<Vec<f32>> {
        let encoding = tokenizer
            .encode(text, true)
            .map_err(|e| fail(format!("tokenization failed: {}", e)))?;

        let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
        let input_ids = &encoding.get_ids()[..seq_len];
        let attention_mask = &encoding.get_attention_mask()[..seq_len];

        let ids_data: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let mask_data: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();
        let type_ids_data: Vec<i64> = vec![0i64; seq_len];

        let ids_tensor = Tensor::from_array(([1usize, seq_len], ids_data)).map_err(fail)?;
        let mask_tensor = Tensor::from_array(([1usize, seq_len], mask_data)).map_err(fail)?;
        let type_ids_tensor =
            Tensor::from_array(([1usize, seq_len], type_ids_data)).map_err(fail)?;

        let mut session = session.lock();
        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
            .map_err(|e| fail(format!("ONNX inference failed: {}", e)))?;

        // Either [1, seq_len, dim] token embeddings or [1, dim] pooled output.
        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(fail)?;
        let shape_dims: Vec<i64> = shape.iter().copied().collect();

        let pooled = match shape_dims.len() {
            3 => {
                let dim = shape_dims[2] as usize;
                let mask_sum: f32 = attention_mask.iter().map(|&m| m as f32).sum();
                if mask_sum < 1e-9 {
                    return Err(fail("empty attention mask"));
                }
                let mut pooled = Array1::<f32>::zeros(dim);
                for (i, &m) in attention_mask.iter().enumerate() {
                    if m > 0 {
                        let offset = i * dim;
                        for d in 0..dim {
                            pooled[d] += data[offset + d];
                        }
                    }
                }
                pooled / mask_sum
            }
            2 => {
                let dim = shape_dims[1] as usize;
                Array1::from_vec(data[..dim].to_vec())
            }
            _ => return Err(fail(format!("unexpected output shape: {:?}", shape_dims))),
        };

        let mut vector = pooled.to_vec();
        l2_normalize(&mut vector);
        Ok(vector)
    }

    #[async_trait]
    impl Embedder for OnnxEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut batch = self.embed_batch(&[text]).await?;
            batch.pop().ok_or_else(|| fail("no embedding produced"))
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            let session = Arc::clone(&self.session);
            let tokenizer = Arc::clone(&self.tokenizer);
            let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();

            tokio::task::spawn_blocking(move || {
                owned
                    .iter()
                    .map(|t| infer(&session, &tokenizer, t))
                    .collect::<Result<Vec<_>>>()
            })
            .await
            .map_err(|e| Error::Internal(format!("embedding task panicked: {}", e)))?
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn id(&self) -> String {
            format!("onnx:{}", self.model_dir.display())
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
