use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::Host;
use crate::error::VizError;
use crate::session::Session;

/// Extension of the packed viewer format produced by the bundled converter.
pub const PACKED_EXT: &str = "vtkp";

/// Converts a geometry definition file into the packed format the standalone
/// viewer consumes. Opaque collaborator; the bundled implementation just
/// validates and repacks, a real deployment plugs in the actual converter.
pub trait GeometryConverter: Send + Sync {
    fn convert(
        &self,
        model: &Utf8Path,
        out_dir: &Utf8Path,
        name: &str,
    ) -> Result<Utf8PathBuf, VizError>;
}

/// Validates the HBJSON payload and writes it gzip-packed under the model's
/// stem. Always repacks from the model file, overwriting any package left by
/// an earlier conversion of the same stem; conversion reuse is the session
/// cache's job, not this converter's.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedConverter;

impl GeometryConverter for PackedConverter {
    fn convert(
        &self,
        model: &Utf8Path,
        out_dir: &Utf8Path,
        name: &str,
    ) -> Result<Utf8PathBuf, VizError> {
        let packed = out_dir.join(format!("{name}.{PACKED_EXT}"));
        let content =
            fs::read(model.as_std_path()).map_err(|err| VizError::Filesystem(err.to_string()))?;
        let payload: Value =
            serde_json::from_slice(&content).map_err(|err| VizError::Conversion {
                path: model.to_owned(),
                message: err.to_string(),
            })?;
        let serialized = serde_json::to_vec(&payload).map_err(|err| VizError::Conversion {
            path: model.to_owned(),
            message: err.to_string(),
        })?;

        let file = fs::File::create(packed.as_std_path())
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(&serialized)
            .and_then(|_| encoder.finish().map(drop))
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        Ok(packed)
    }
}

/// Fixed bake parameters handed to the embedded host alongside the model.
#[derive(Debug, Clone, Serialize)]
pub struct BakeOptions {
    pub layer: String,
    pub units: String,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            layer: "hbjson".to_string(),
            units: "Meters".to_string(),
        }
    }
}

/// Where rendered geometry ends up: a packed byte stream for the standalone
/// viewer, or dictionary-form model payloads for the embedded host bridge.
pub trait DisplaySurface {
    fn show_packed(&mut self, key: &str, bytes: &[u8]) -> Result<(), VizError>;
    fn show_model(&mut self, model: &Value) -> Result<(), VizError>;
    fn offer_bake(&mut self, model: &Value, options: &BakeOptions) -> Result<(), VizError>;
}

/// Rendering capability, picked once per session from the declared host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    /// Embedded host with side-by-side view and bake affordances.
    Embedded { bake: bool },
    /// Standalone packed-format viewer with a per-stem session cache.
    Packed,
}

impl Renderer {
    pub fn for_host(host: Host) -> Self {
        match host {
            Host::Rhino => Renderer::Embedded { bake: true },
            Host::Web => Renderer::Packed,
        }
    }

    pub fn render(
        &self,
        model_path: &Utf8Path,
        session: &mut Session,
        converter: &dyn GeometryConverter,
        surface: &mut dyn DisplaySurface,
    ) -> Result<(), VizError> {
        if model_path.as_str().is_empty() {
            return Err(VizError::EmptyModelPath);
        }
        if !model_path.as_std_path().is_file() {
            return Err(VizError::ModelNotFound(model_path.to_owned()));
        }

        match self {
            Renderer::Embedded { bake } => {
                let content = fs::read(model_path.as_std_path())
                    .map_err(|err| VizError::Filesystem(err.to_string()))?;
                let model: Value =
                    serde_json::from_slice(&content).map_err(|err| VizError::Conversion {
                        path: model_path.to_owned(),
                        message: err.to_string(),
                    })?;
                surface.show_model(&model)?;
                if *bake {
                    surface.offer_bake(&model, &BakeOptions::default())?;
                }
                Ok(())
            }
            Renderer::Packed => {
                let stem = model_path
                    .file_stem()
                    .ok_or_else(|| VizError::ModelNotFound(model_path.to_owned()))?
                    .to_string();

                let packed = match session.cached_viewer_file(&stem) {
                    Some(cached) => {
                        debug!(%stem, "viewer cache hit");
                        cached.to_owned()
                    }
                    None => {
                        let viewer_dir = session.viewer_dir();
                        Session::ensure_dir(&viewer_dir)?;
                        let packed = converter.convert(model_path, &viewer_dir, &stem)?;
                        session.record_viewer_file(stem.clone(), packed.clone());
                        packed
                    }
                };

                let bytes = fs::read(packed.as_std_path())
                    .map_err(|err| VizError::Filesystem(err.to_string()))?;
                surface.show_packed(&stem, &bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use flate2::read::GzDecoder;
    use std::io::Read;

    use super::*;

    #[test]
    fn packed_converter_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let model = root.join("x.hbjson");
        fs::write(model.as_std_path(), br#"{"type": "Model", "rooms": []}"#).unwrap();

        let packed = PackedConverter.convert(&model, &root, "x").unwrap();
        assert_eq!(packed.file_name(), Some("x.vtkp"));

        let mut decoder = GzDecoder::new(fs::File::open(packed.as_std_path()).unwrap());
        let mut unpacked = String::new();
        decoder.read_to_string(&mut unpacked).unwrap();
        let value: Value = serde_json::from_str(&unpacked).unwrap();
        assert_eq!(value["type"], "Model");
    }

    #[test]
    fn packed_converter_overwrites_stale_package() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let model = root.join("x.hbjson");

        fs::write(model.as_std_path(), br#"{"identifier": "first"}"#).unwrap();
        PackedConverter.convert(&model, &root, "x").unwrap();

        // same stem, new model content; the package must follow the model
        fs::write(model.as_std_path(), br#"{"identifier": "second"}"#).unwrap();
        let packed = PackedConverter.convert(&model, &root, "x").unwrap();

        let mut decoder = GzDecoder::new(fs::File::open(packed.as_std_path()).unwrap());
        let mut unpacked = String::new();
        decoder.read_to_string(&mut unpacked).unwrap();
        let value: Value = serde_json::from_str(&unpacked).unwrap();
        assert_eq!(value["identifier"], "second");
    }

    #[test]
    fn packed_converter_rejects_non_json() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let model = root.join("x.hbjson");
        fs::write(model.as_std_path(), b"not json").unwrap();
        let err = PackedConverter.convert(&model, &root, "x").unwrap_err();
        assert!(matches!(err, VizError::Conversion { .. }));
    }

    #[test]
    fn renderer_for_host() {
        assert_eq!(Renderer::for_host(Host::Web), Renderer::Packed);
        assert_eq!(
            Renderer::for_host(Host::Rhino),
            Renderer::Embedded { bake: true }
        );
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut session = Session::new(Host::Web).unwrap();
        let mut surface = NullSurface;
        let err = Renderer::Packed
            .render(Utf8Path::new(""), &mut session, &PackedConverter, &mut surface)
            .unwrap_err();
        assert!(matches!(err, VizError::EmptyModelPath));
    }

    struct NullSurface;

    impl DisplaySurface for NullSurface {
        fn show_packed(&mut self, _key: &str, _bytes: &[u8]) -> Result<(), VizError> {
            Ok(())
        }

        fn show_model(&mut self, _model: &Value) -> Result<(), VizError> {
            Ok(())
        }

        fn offer_bake(&mut self, _model: &Value, _options: &BakeOptions) -> Result<(), VizError> {
            Ok(())
        }
    }
}
