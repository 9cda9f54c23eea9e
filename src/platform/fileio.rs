use std::path::Path;

use tracing::debug;

/// Converts a load file path to a URL the program's HTTP server will
/// recognize.
#[cfg(target_arch = "wasm32")]
fn format_url<P>(file_name: P) -> anyhow::Result<reqwest::Url>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .ok_or_else(|| anyhow::anyhow!("no window location available"))?;
    let base_url = reqwest::Url::parse(&format!("{}/", origin))?;
    let path = file_name
        .as_ref()
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid utf8 chars in file path {file_name:?}"))?;

    Ok(base_url.join(path)?)
}

/// Loads a file relative to `root` and returns it as a vector of bytes.
#[cfg(not(target_arch = "wasm32"))]
pub fn load_as_binary<P>(root: &Path, file_path: P) -> anyhow::Result<Vec<u8>>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let full_path = root.join(file_path.as_ref());
    debug!("load file as binary: {full_path:?}");

    Ok(std::fs::read(full_path)?)
}

/// Fetches a file relative to the page origin and returns it as a vector of
/// bytes.
#[cfg(target_arch = "wasm32")]
pub async fn fetch_as_binary<P>(file_path: P) -> anyhow::Result<Vec<u8>>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let url = format_url(&file_path)?;
    debug!("fetch file as binary: {url}");

    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_error() {
        let root = std::env::temp_dir();
        assert!(load_as_binary(&root, "haunted_house/does/not/exist.jpg").is_err());
    }

    #[test]
    fn reads_file_relative_to_root() {
        let root = std::env::temp_dir().join("haunted_house_fileio_test");
        std::fs::create_dir_all(root.join("textures")).unwrap();
        std::fs::write(root.join("textures/blob.bin"), [1u8, 2, 3]).unwrap();

        let bytes = load_as_binary(&root, "textures/blob.bin").unwrap();
        assert_eq!(vec![1u8, 2, 3], bytes);
    }
}
