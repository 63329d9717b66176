//! Byte-for-byte copy importer.

use super::{ImportError, Importer, Input};
use std::io::Write;
use std::path::PathBuf;

/// Copies the input to the same relative path under the output root.
#[derive(Debug, Default)]
pub struct CopyImporter {
    data: Option<Vec<u8>>,
}

impl CopyImporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Importer for CopyImporter {
    fn name(&self) -> &str {
        "copy"
    }

    fn start_import(&mut self, input: &Input, dry_run: bool) -> Result<bool, ImportError> {
        if !dry_run {
            let data =
                std::fs::read(&input.path).map_err(|e| ImportError::io(&input.path, e))?;
            self.data = Some(data);
        }
        Ok(true)
    }

    fn outputs(&self, input: &Input) -> Result<Vec<PathBuf>, ImportError> {
        Ok(vec![input.relative_path()])
    }

    fn write_output(
        &mut self,
        input: &Input,
        index: usize,
        sink: &mut dyn Write,
    ) -> Result<(), ImportError> {
        if index != 0 {
            return Err(ImportError::NoSuchOutput { path: input.path.clone(), index });
        }
        let data = match &self.data {
            Some(data) => data.clone(),
            None => std::fs::read(&input.path).map_err(|e| ImportError::io(&input.path, e))?,
        };
        sink.write_all(&data).map_err(|e| ImportError::io(&input.path, e))
    }

    fn end_import(&mut self, _input: &Input) {
        self.data = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::ImportScope;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_copy_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tex/rock.png");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, [0u8, 1, 2, 255]).unwrap();

        let input = Input::new(&path, temp.path());
        let mut importer = CopyImporter::new();
        assert_eq!(importer.outputs(&input).unwrap(), vec![PathBuf::from("tex/rock.png")]);

        let mut out = Vec::new();
        {
            let mut scope = ImportScope::start(&mut importer, &input, false).unwrap().unwrap();
            scope.write_output(0, &mut out).unwrap();
            assert!(scope.write_output(1, &mut Vec::new()).is_err());
        }
        assert_eq!(out, vec![0u8, 1, 2, 255]);
        assert!(importer.data.is_none());
    }

    #[test]
    fn test_missing_file_fails() {
        let input = Input::new(Path::new("/definitely/not/here.bin"), Path::new("/definitely"));
        let mut importer = CopyImporter::new();
        assert!(matches!(
            importer.start_import(&input, false),
            Err(ImportError::Io { .. })
        ));
    }
}
