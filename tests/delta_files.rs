//! File-based updates: the `<assembly>.<generation>.dmeta`/`.dil` convention.

use std::{fs, path::PathBuf};

use dotpatch::prelude::*;

fn method_token(row: u32) -> Token {
    Token::from_parts(TableId::MethodDef, row)
}

/// A scratch directory that cleans up after itself.
struct Scratch(PathBuf);

impl Scratch {
    fn new(tag: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("dotpatch-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        Scratch(dir)
    }

    fn assembly_path(&self) -> PathBuf {
        self.0.join("App.dll")
    }

    fn write_pair(&self, generation: u32, dmeta: &[u8], dil: &[u8]) {
        let base = self.assembly_path();
        let mut dmeta_path = base.clone().into_os_string();
        dmeta_path.push(format!(".{generation}.dmeta"));
        let mut dil_path = base.into_os_string();
        dil_path.push(format!(".{generation}.dil"));
        fs::write(dmeta_path, dmeta).unwrap();
        fs::write(dil_path, dil).unwrap();
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn test_module() -> Module {
    Module::builder()
        .name("App.dll")
        .table_rows(TableId::MethodDef, vec![vec![0u8; 8]])
        .method_body(method_token(1), b"bodyA".to_vec())
        .build()
        .unwrap()
}

#[test]
fn applies_generations_from_disk_in_order() -> Result<()> {
    let scratch = Scratch::new("ordered");
    let module = test_module();

    let (dmeta, dil) = DeltaWriter::new()
        .il_body(method_token(1), b"bodyB".to_vec())
        .finish();
    scratch.write_pair(1, &dmeta, &dil);

    let (dmeta, dil) = DeltaWriter::new()
        .il_body(method_token(1), b"bodyC".to_vec())
        .finish();
    scratch.write_pair(2, &dmeta, &dil);

    assert_eq!(module.apply_update_from_files(&scratch.assembly_path())?, 1);
    assert_eq!(module.resolve(method_token(1))?.il.as_ref(), b"bodyB");

    assert_eq!(module.apply_update_from_files(&scratch.assembly_path())?, 2);
    assert_eq!(module.resolve(method_token(1))?.il.as_ref(), b"bodyC");
    Ok(())
}

#[test]
fn missing_pair_is_a_file_error() {
    let scratch = Scratch::new("missing");
    let module = test_module();

    let err = module
        .apply_update_from_files(&scratch.assembly_path())
        .unwrap_err();
    assert!(matches!(err, Error::FileError(_)));
    assert_eq!(err.stage(), Stage::Parse);
    assert_eq!(module.generation(), 0);
}

#[test]
fn corrupt_file_on_disk_is_rejected() {
    let scratch = Scratch::new("corrupt");
    let module = test_module();

    scratch.write_pair(1, b"not a dmeta file", b"");

    let err = module
        .apply_update_from_files(&scratch.assembly_path())
        .unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::BadMagic { .. })));
    assert_eq!(module.generation(), 0);
}
