//! Generates `builtins.rs` from `data/*_CODES.json`.

use serde::Deserialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::{env, fs};

#[derive(Deserialize)]
struct DictionaryFile {
    name: String,
    marker_size: usize,
    min_distance: u8,
    max_correction_bits: u8,
    codes: Vec<u64>,
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let data_dir = manifest_dir.join("data");
    println!("cargo:rerun-if-changed={}", data_dir.display());

    let mut files: Vec<PathBuf> = fs::read_dir(&data_dir)
        .expect("read data/")
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_CODES.json"))
        })
        .collect();
    files.sort();

    let dicts: Vec<DictionaryFile> = files.iter().map(|p| load(p)).collect();

    let mut out = String::new();
    out.push_str("use crate::Dictionary;\n\n");
    for d in &dicts {
        let codes = d
            .codes
            .iter()
            .map(|c| format!("0x{c:x}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            out,
            "const {name}_CODES: [u64; {len}] = [{codes}];\n\
             /// Built-in dictionary `{name}`.\n\
             pub const {name}: Dictionary = Dictionary {{ name: \"{name}\", marker_size: {n}, \
             min_distance: {dmin}, max_correction_bits: {corr}, codes: &{name}_CODES }};\n",
            name = d.name,
            len = d.codes.len(),
            n = d.marker_size,
            dmin = d.min_distance,
            corr = d.max_correction_bits,
        )
        .expect("format");
    }

    let names = dicts
        .iter()
        .map(|d| format!("\"{}\"", d.name))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        out,
        "/// Names of all built-in dictionaries.\npub const BUILTIN_DICTIONARY_NAMES: &[&str] = &[{names}];\n"
    )
    .expect("format");

    out.push_str(
        "/// Look up a built-in dictionary by name (for example `DICT_4X4_50`).\n\
         pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {\n    match name {\n",
    );
    for d in &dicts {
        writeln!(out, "        \"{0}\" => Some({0}),", d.name).expect("format");
    }
    out.push_str("        _ => None,\n    }\n}\n");

    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR")).join("builtins.rs");
    fs::write(out_path, out).expect("write builtins.rs");
}

fn load(path: &Path) -> DictionaryFile {
    println!("cargo:rerun-if-changed={}", path.display());
    let raw = fs::read_to_string(path).expect("read dictionary json");
    let dict: DictionaryFile = serde_json::from_str(&raw).expect("parse dictionary json");
    let bits = dict.marker_size * dict.marker_size;
    assert!(bits <= 64, "{}: {} bits do not fit in u64", dict.name, bits);
    for &code in &dict.codes {
        assert!(
            bits == 64 || code >> bits == 0,
            "{}: code 0x{:x} exceeds {} bits",
            dict.name,
            code,
            bits
        );
    }
    dict
}
