pub mod config;
pub mod corpus;
pub mod dataset;
pub mod error;
pub mod hsv;
pub mod matcher;
pub mod remedy;
pub mod signature;

pub use config::{Config, ExtractorConfig, Filter};
pub use corpus::{Category, Corpus};
pub use error::{Error, Result};
pub use matcher::{best, bhattacharyya, classify, rank, CategoryScore, MatchResult};
pub use signature::{Extractor, Signature};

pub mod identify {

    use image::DynamicImage;

    use crate::{dataset, matcher, CategoryScore, Config, Corpus, Error, Extractor, MatchResult, Result};

    /// Outcome for one query image: the chosen category and the full ranking
    /// it was chosen from, best first.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Identification {
        pub result: MatchResult,
        pub ranking: Vec<CategoryScore>,
    }

    /// A loaded reference corpus together with the extractor that built it, so
    /// queries are always fingerprinted the same way as the references.
    pub struct Identifier {
        config: Config,
        extractor: Extractor,
        corpus: Corpus,
    }

    impl Identifier {
        pub fn new(config: Config, corpus: Corpus) -> Result<Self> {
            config.validate()?;
            let extractor = Extractor::new(config.extractor.clone())?;
            if let Some(found) = corpus.signature_len() {
                if found != extractor.signature_len() {
                    return Err(Error::SignatureLength {
                        expected: extractor.signature_len(),
                        found,
                    });
                }
            }
            Ok(Self {
                config,
                extractor,
                corpus,
            })
        }

        /// Reads the dataset folders named by `config`. Fails if no category
        /// yielded a single reference image.
        pub fn load(config: Config) -> Result<Self> {
            config.validate()?;
            let extractor = Extractor::new(config.extractor.clone())?;
            let corpus = dataset::load_corpus(&config, &extractor)?;
            if corpus.is_empty() {
                return Err(Error::EmptyCorpus);
            }
            Ok(Self {
                config,
                extractor,
                corpus,
            })
        }

        pub fn config(&self) -> &Config {
            &self.config
        }

        /**
         * Fingerprints `image` and scores it against every populated category once.
         * `Ok(None)` when there was no image to fingerprint.
         */
        pub fn identify(&self, image: Option<&DynamicImage>) -> Result<Option<Identification>> {
            let signature = match self.extractor.extract(image) {
                Some(signature) => signature,
                None => return Ok(None),
            };
            let ranking = matcher::rank(&signature, &self.corpus)?;
            Ok(Some(Identification {
                result: matcher::best(&ranking),
                ranking,
            }))
        }
    }
}

#[cfg(test)]
fn patchy(base: [u8; 3], spot: [u8; 3], every: u32) -> image::DynamicImage {
    image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(96, 96, |x, y| {
        if (x / 8 + y / 8) % every == 0 {
            image::Rgb(spot)
        } else {
            image::Rgb(base)
        }
    }))
}

#[cfg(test)]
const GREEN: [u8; 3] = [40, 150, 40];
#[cfg(test)]
const ORANGE: [u8; 3] = [200, 90, 20];
#[cfg(test)]
const BROWN: [u8; 3] = [40, 30, 20];

#[cfg(test)]
fn test_identifier() -> identify::Identifier {
    let config = Config::default();
    let extractor = Extractor::new(config.extractor.clone()).unwrap();
    let mut corpus = Corpus::with_categories(config.categories.clone());
    let references = [
        ("healthy", patchy(GREEN, [30, 120, 30], 4)),
        ("healthy", patchy(GREEN, GREEN, 1)),
        ("rust", patchy(ORANGE, GREEN, 4)),
        ("rust", patchy([210, 100, 30], ORANGE, 2)),
        ("blight", patchy(BROWN, GREEN, 4)),
    ];
    for (label, image) in references.iter() {
        let signature = extractor.extract(Some(image)).unwrap();
        corpus.insert((*label).into(), signature).unwrap();
    }
    identify::Identifier::new(config, corpus).unwrap()
}

#[test]
fn identifies_exact_reference() {
    let identifier = test_identifier();
    let result = identifier
        .identify(Some(&patchy(BROWN, GREEN, 4)))
        .unwrap()
        .unwrap()
        .result;
    assert_eq!(result.label(), "blight");
    assert!(result.score() < 1e-6);
}

#[test]
fn healthy_query_is_healthy() {
    let identifier = test_identifier();
    let result = identifier
        .identify(Some(&patchy([35, 135, 35], [35, 135, 35], 1)))
        .unwrap()
        .unwrap()
        .result;
    assert_eq!(result.label(), "healthy");
    assert!(result.score().is_finite());
}

#[test]
fn absent_image_is_not_classified() {
    let identifier = test_identifier();
    assert!(identifier.identify(None).unwrap().is_none());
    assert!(identifier
        .identify(Some(&image::DynamicImage::new_rgb8(0, 0)))
        .unwrap()
        .is_none());
}

#[test]
fn ranking_covers_populated_categories() {
    let identifier = test_identifier();
    let found = identifier
        .identify(Some(&patchy([205, 95, 25], [205, 95, 25], 1)))
        .unwrap()
        .unwrap();
    let ranked = &found.ranking;
    assert_eq!(found.result.label(), "rust");
    assert_eq!(found.result.score(), ranked[0].distance);
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].category.as_str(), "rust");
    assert_eq!(ranked[0].samples, 2);
    assert!(ranked.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn mismatched_corpus_is_rejected() {
    let mut corpus = Corpus::new();
    corpus
        .insert("healthy".into(), Signature::try_from(vec![1.0_f32; 10]).unwrap())
        .unwrap();
    assert!(matches!(
        identify::Identifier::new(Config::default(), corpus),
        Err(Error::SignatureLength {
            expected: 324,
            found: 10
        })
    ));
}
