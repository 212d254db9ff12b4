//! Recognizing audio assets and uploads by extension and MIME type.

/// Extensions of produced assets that get materialized into songs.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "opus", "m4a", "aac", "webm"];

/// Upload MIME types accepted for reference audio, with the extension used
/// when the file name carries none.
const UPLOAD_MIME_TYPES: &[(&str, &str)] = &[
    ("audio/mpeg", ".mp3"),
    ("audio/mp3", ".mp3"),
    ("audio/mpeg3", ".mp3"),
    ("audio/x-mpeg-3", ".mp3"),
    ("audio/wav", ".wav"),
    ("audio/x-wav", ".wav"),
    ("audio/flac", ".flac"),
    ("audio/x-flac", ".flac"),
    ("audio/mp4", ".m4a"),
    ("audio/aac", ".aac"),
    ("audio/ogg", ".ogg"),
    ("audio/webm", ".webm"),
];

const UPLOAD_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".flac", ".m4a", ".aac", ".ogg", ".webm", ".opus"];

/// Extension used when neither file name nor MIME type tells us anything.
pub const FALLBACK_UPLOAD_EXTENSION: &str = ".audio";

/// Lowercased extension of the last path segment, ignoring query and fragment.
fn path_extension(location: &str) -> Option<String> {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = &location[..end];
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// The audio extension of an asset location, if it is a recognized one.
pub fn audio_extension(location: &str) -> Option<String> {
    path_extension(location).filter(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn mime_for_extension(ext: &str) -> String {
    mime_guess::from_ext(ext)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase()
}

/// Whether an uploaded file looks like audio, by MIME type or extension.
pub fn is_supported_audio_upload(filename: Option<&str>, mime_type: Option<&str>) -> bool {
    let mime_ok = mime_type
        .map(normalize_mime)
        .is_some_and(|m| UPLOAD_MIME_TYPES.iter().any(|(known, _)| *known == m));
    let ext_ok = filename
        .and_then(path_extension)
        .is_some_and(|ext| UPLOAD_EXTENSIONS.contains(&format!(".{}", ext).as_str()));
    mime_ok || ext_ok
}

/// Extension for a stored upload: from the file name, else the MIME type,
/// else [`FALLBACK_UPLOAD_EXTENSION`].
pub fn upload_extension(filename: Option<&str>, mime_type: Option<&str>) -> String {
    if let Some(ext) = filename.and_then(path_extension) {
        if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format!(".{}", ext);
        }
    }
    mime_type
        .map(normalize_mime)
        .and_then(|m| {
            UPLOAD_MIME_TYPES
                .iter()
                .find(|(known, _)| *known == m)
                .map(|(_, ext)| ext.to_string())
        })
        .unwrap_or_else(|| FALLBACK_UPLOAD_EXTENSION.to_string())
}
