use std::path::Path;

/// Leading bytes of every PDF file
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Boundary check for inputs: PDF magic bytes, or a `.pdf` extension
pub fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
        || path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Human readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`
pub fn format_bytes(bytes: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 3] = ["Bytes", "KB", "MB"];
    let k = 1024_f64;
    let value = bytes as f64;
    let exponent = ((value.ln() / k.ln()).floor() as usize).min(UNITS.len() - 1);
    let scaled = value / k.powi(exponent as i32);
    let rounded = (scaled * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[exponent])
}

/// Space saved as a percentage of the original size, two decimals
pub fn compression_ratio(original: usize, compressed: usize) -> String {
    if original == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", (1.0 - compressed as f64 / original as f64) * 100.0)
}

/// Output file name for an input: `<prefix><name>.<extension>`
pub fn output_name(prefix: &str, filename: &str, extension: &str) -> String {
    format!("{}{}.{}", prefix, filename, extension)
}
