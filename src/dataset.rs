use rayon::prelude::*;
use tracing::{info, warn};

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::corpus::{Category, Corpus};
use crate::error::Result;
use crate::signature::{Extractor, Signature};

/// Image files directly inside `dir`, sorted by path. Subfolders are not walked.
pub fn image_files(dir: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = vec![];
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        if config.accepts_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Extracts every file in parallel, dropping the ones that fail to decode.
/// Output order follows `paths`.
pub fn signatures(extractor: &Extractor, paths: &[PathBuf]) -> Vec<Signature> {
    paths
        .par_iter()
        .map(|path| extractor.extract_path(path))
        .collect::<Vec<Option<Signature>>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Builds the reference corpus from the images in `<dataset>/<category>/` for
/// every configured category, in configuration order. A missing category folder
/// is logged and left out; a folder with no usable images becomes an empty category.
pub fn load_corpus(config: &Config, extractor: &Extractor) -> Result<Corpus> {
    info!("Loading and processing dataset from {}", config.dataset.display());
    let mut corpus = Corpus::new();

    for label in &config.categories {
        let dir = config.dataset.join(label);
        if !dir.is_dir() {
            warn!("Dataset path not found: {}", dir.display());
            continue;
        }

        let files = image_files(&dir, config)?;
        let found = signatures(extractor, &files);
        if found.len() < files.len() {
            warn!(
                "Skipped {} unreadable image(s) for {}",
                files.len() - found.len(),
                label
            );
        }
        info!("Loaded {} samples for {}", found.len(), label);
        corpus.extend(Category::new(label.as_str()), found)?;
    }

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::tempdir;

    fn write_solid(path: &Path, color: [u8; 3]) {
        RgbImage::from_pixel(20, 20, Rgb(color)).save(path).unwrap();
    }

    fn small_config(dataset: &Path) -> Config {
        let mut config = Config::default();
        config.dataset = dataset.to_path_buf();
        config.extractor.resolution = (32, 32);
        config
    }

    #[test]
    fn builds_corpus_from_folders() {
        let tmp = tempdir().unwrap();
        let healthy = tmp.path().join("healthy");
        let rust = tmp.path().join("rust");
        fs::create_dir_all(healthy.join("nested")).unwrap();
        fs::create_dir_all(&rust).unwrap();

        write_solid(&healthy.join("a.png"), [20, 180, 30]);
        write_solid(&healthy.join("b.png"), [30, 160, 40]);
        write_solid(&healthy.join("nested").join("c.png"), [30, 160, 40]);
        fs::write(healthy.join("notes.txt"), "not an image").unwrap();
        fs::write(healthy.join("broken.png"), b"definitely not a png").unwrap();
        write_solid(&rust.join("r.png"), [190, 90, 20]);

        let config = small_config(tmp.path());
        let extractor = Extractor::new(config.extractor.clone()).unwrap();
        let corpus = load_corpus(&config, &extractor).unwrap();

        // blight has no folder and is left out
        let order: Vec<&str> = corpus.categories().map(|c| c.as_str()).collect();
        assert_eq!(order, vec!["healthy", "rust"]);
        assert_eq!(corpus.get(&"healthy".into()).unwrap().len(), 2);
        assert_eq!(corpus.get(&"rust".into()).unwrap().len(), 1);
        assert_eq!(corpus.signature_len(), Some(324));
    }

    #[test]
    fn empty_folder_gives_empty_category() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("healthy")).unwrap();

        let config = small_config(tmp.path());
        let extractor = Extractor::new(config.extractor.clone()).unwrap();
        let corpus = load_corpus(&config, &extractor).unwrap();
        assert_eq!(corpus.get(&"healthy".into()).unwrap().len(), 0);
        assert!(corpus.is_empty());
    }

    #[test]
    fn files_are_sorted_and_filtered() {
        let tmp = tempdir().unwrap();
        for name in ["b.jpg", "a.png", "c.gif"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        let files = image_files(tmp.path(), &Config::default()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }
}
