//! SafeTensors weight I/O.

use std::collections::HashMap;
use std::path::Path;

use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;

use crate::{Error, Result, Tensor};

/// Load a SafeTensors file into a name → tensor map.
///
/// Tensors are flattened to 1-D; shapes are re-imposed by the consuming
/// layers, which validate element counts against the architecture config.
///
/// # Errors
/// Returns an error if the file is unreadable, malformed, or holds a dtype
/// other than F32.
pub fn load_params(path: &Path) -> Result<HashMap<String, Tensor>> {
    let data = std::fs::read(path)
        .map_err(|e| Error::Io(format!("Failed to read {}: {e}", path.display())))?;
    let tensors = SafeTensors::deserialize(&data)
        .map_err(|e| Error::Serialization(format!("Invalid SafeTensors {}: {e}", path.display())))?;

    let mut params = HashMap::new();
    for name in tensors.names() {
        let view = tensors
            .tensor(name)
            .map_err(|e| Error::Serialization(format!("Tensor '{name}': {e}")))?;
        if view.dtype() != Dtype::F32 {
            return Err(Error::Serialization(format!(
                "Tensor '{name}' has dtype {:?}; only F32 is supported",
                view.dtype()
            )));
        }
        // pod_collect_to_vec tolerates the unaligned byte offsets a
        // SafeTensors payload can have; cast_slice would panic on them.
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
        params.insert(name.to_string(), Tensor::from_vec(values, false));
    }

    Ok(params)
}

/// Serialize named tensors to a SafeTensors file.
///
/// `shape` per entry is the logical shape; element counts must multiply out
/// to the tensor length.
///
/// # Errors
/// Returns an error if serialization or the final write fails.
pub fn save_params(path: &Path, entries: &[(String, Vec<usize>, Vec<f32>)]) -> Result<()> {
    let byte_buffers: Vec<Vec<u8>> = entries
        .iter()
        .map(|(_, _, values)| bytemuck::cast_slice(values).to_vec())
        .collect();

    let views: Vec<(&str, TensorView<'_>)> = entries
        .iter()
        .zip(byte_buffers.iter())
        .map(|((name, shape, _), bytes)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map_err(|e| Error::Serialization(format!("Tensor '{name}': {e}")))?;
            Ok((name.as_str(), view))
        })
        .collect::<Result<_>>()?;

    let bytes = safetensors::serialize(views, None)
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;
    std::fs::write(path, bytes)
        .map_err(|e| Error::Io(format!("Failed to write {}: {e}", path.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.safetensors");

        let entries = vec![
            ("a.weight".to_string(), vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            ("a.bias".to_string(), vec![3], vec![0.1, 0.2, 0.3]),
        ];
        save_params(&path, &entries).expect("save");

        let params = load_params(&path).expect("load");
        assert_eq!(params.len(), 2);
        assert_eq!(
            params["a.weight"].data().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(params["a.bias"].data().to_vec(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_params(Path::new("/nonexistent/model.safetensors")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn shape_element_mismatch_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.safetensors");
        let entries = vec![("w".to_string(), vec![2, 2], vec![1.0, 2.0, 3.0])];
        assert!(save_params(&path, &entries).is_err());
    }
}
