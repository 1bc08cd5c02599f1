use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::detection::infrastructure::model_resolver::ModelResolveError;

/// Subtracted from stage thresholds to absorb float rounding in training.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

/// Windows flatter than this (in 8-bit intensity units) cannot hold a face.
const MIN_WINDOW_STDDEV: f64 = 1.0;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error(transparent)]
    Resolve(#[from] ModelResolveError),
    #[error("cannot read cascade {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid cascade: {0}")]
    Format(String),
}

fn format_err(msg: impl Into<String>) -> ModelLoadError {
    ModelLoadError::Format(msg.into())
}

#[derive(Clone, Debug, PartialEq)]
struct WeightedRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct HaarFeature {
    rects: Vec<WeightedRect>,
}

/// One split: `value < threshold` goes `left`, otherwise `right`.
/// Child indices `<= 0` are leaves, addressed as `leaf_values[-idx]`.
#[derive(Clone, Debug, PartialEq)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct WeakClassifier {
    nodes: Vec<TreeNode>,
    leaf_values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
struct Stage {
    threshold: f64,
    classifiers: Vec<WeakClassifier>,
}

/// A boosted cascade of upright Haar features, as trained by OpenCV.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cascade = Self::from_xml(&text)?;
        log::debug!(
            "Loaded cascade {} ({} stages, {} features, {}x{} window)",
            path.display(),
            cascade.stages.len(),
            cascade.features.len(),
            cascade.window_width,
            cascade.window_height
        );
        Ok(cascade)
    }

    /// Parses the `opencv-cascade-classifier` XML layout.
    pub fn from_xml(text: &str) -> Result<Self, ModelLoadError> {
        let doc = Document::parse(text)?;
        let root = doc.root_element();
        let cascade = if root.tag_name().name() == "cascade" {
            root
        } else {
            element(root, "cascade").map_err(|_| {
                format_err("no <cascade> node; legacy haar-classifier files are not supported")
            })?
        };

        let stage_type = text_of(cascade, "stageType")?;
        if stage_type != "BOOST" {
            return Err(format_err(format!("unsupported stage type {stage_type}")));
        }
        let feature_type = text_of(cascade, "featureType")?;
        if feature_type != "HAAR" {
            return Err(format_err(format!("unsupported feature type {feature_type}")));
        }

        let window_width: u32 = parse_child(cascade, "width")?;
        let window_height: u32 = parse_child(cascade, "height")?;
        if window_width < 3 || window_height < 3 {
            return Err(format_err(format!(
                "window {window_width}x{window_height} is too small"
            )));
        }

        let features = items(element(cascade, "features")?)
            .map(|n| parse_feature(n, window_width, window_height))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = items(element(cascade, "stages")?)
            .map(|n| parse_stage(n, features.len()))
            .collect::<Result<Vec<_>, _>>()?;
        if stages.is_empty() {
            return Err(format_err("cascade has no stages"));
        }

        Ok(Self {
            window_width,
            window_height,
            stages,
            features,
        })
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs every stage on the window whose top-left corner is `(x, y)`.
    ///
    /// Returns `true` only if the window survives all stages.
    pub fn accepts(&self, ii: &IntegralImage, x: u32, y: u32) -> bool {
        let Some(inv_norm) = self.inverse_norm(ii, x, y) else {
            return false;
        };

        self.stages.iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|weak| self.eval_weak(weak, ii, x, y, inv_norm))
                .sum();
            score >= stage.threshold
        })
    }

    /// `1 / (area * stddev)` over the window minus a 1-pixel border, or
    /// `None` when the window is too flat to classify.
    fn inverse_norm(&self, ii: &IntegralImage, x: u32, y: u32) -> Option<f64> {
        let (w, h) = (self.window_width - 2, self.window_height - 2);
        let area = (w * h) as f64;
        let sum = ii.rect_sum(x + 1, y + 1, w, h) as f64;
        let sq_sum = ii.rect_sq_sum(x + 1, y + 1, w, h) as f64;
        let nf = area * sq_sum - sum * sum;
        if nf <= 0.0 {
            return None;
        }
        let nf = nf.sqrt();
        // nf == area * stddev
        if nf < area * MIN_WINDOW_STDDEV {
            return None;
        }
        Some(1.0 / nf)
    }

    fn eval_weak(&self, weak: &WeakClassifier, ii: &IntegralImage, x: u32, y: u32, inv_norm: f64) -> f64 {
        let mut idx: i32 = 0;
        loop {
            let node = &weak.nodes[idx as usize];
            let value = self.feature_value(node.feature, ii, x, y) * inv_norm;
            idx = if value < node.threshold {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return weak.leaf_values[(-idx) as usize];
            }
        }
    }

    fn feature_value(&self, feature: usize, ii: &IntegralImage, x: u32, y: u32) -> f64 {
        self.features[feature]
            .rects
            .iter()
            .map(|r| r.weight * ii.rect_sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }
}

fn parse_stage(node: Node, n_features: usize) -> Result<Stage, ModelLoadError> {
    let threshold: f64 = parse_child(node, "stageThreshold")?;
    let classifiers = items(element(node, "weakClassifiers")?)
        .map(|n| parse_weak(n, n_features))
        .collect::<Result<Vec<_>, _>>()?;
    if classifiers.is_empty() {
        return Err(format_err("stage without weak classifiers"));
    }
    Ok(Stage {
        threshold: threshold - STAGE_THRESHOLD_EPS,
        classifiers,
    })
}

fn parse_weak(node: Node, n_features: usize) -> Result<WeakClassifier, ModelLoadError> {
    let raw = text_of(node, "internalNodes")?;
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 4 != 0 {
        return Err(format_err(format!(
            "internalNodes needs groups of 4 values, got {}",
            tokens.len()
        )));
    }

    let nodes = tokens
        .chunks_exact(4)
        .map(|t| {
            let feature: usize = parse_token(t[2])?;
            if feature >= n_features {
                return Err(format_err(format!(
                    "feature index {feature} out of range ({n_features} features)"
                )));
            }
            Ok(TreeNode {
                left: parse_token(t[0])?,
                right: parse_token(t[1])?,
                feature,
                threshold: parse_token(t[3])?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let leaf_values = parse_list::<f64>(text_of(node, "leafValues")?)?;

    // Every child must point at an existing node (forward only) or leaf.
    for (i, n) in nodes.iter().enumerate() {
        for child in [n.left, n.right] {
            let ok = if child > 0 {
                (child as usize) > i && (child as usize) < nodes.len()
            } else {
                ((-child) as usize) < leaf_values.len()
            };
            if !ok {
                return Err(format_err(format!("tree child index {child} out of range")));
            }
        }
    }

    Ok(WeakClassifier { nodes, leaf_values })
}

fn parse_feature(node: Node, win_w: u32, win_h: u32) -> Result<HaarFeature, ModelLoadError> {
    if let Ok(tilted) = text_of(node, "tilted") {
        if tilted != "0" {
            return Err(format_err("tilted Haar features are not supported"));
        }
    }

    let rects = items(element(node, "rects")?)
        .map(|n| {
            let text = n.text().unwrap_or_default();
            let tokens: Vec<&str> = text.split_whitespace().collect();
            if tokens.len() != 5 {
                return Err(format_err(format!("feature rect needs 5 values: {text:?}")));
            }
            let rect = WeightedRect {
                x: parse_token(tokens[0])?,
                y: parse_token(tokens[1])?,
                width: parse_token(tokens[2])?,
                height: parse_token(tokens[3])?,
                weight: parse_token(tokens[4])?,
            };
            if rect.x + rect.width > win_w || rect.y + rect.height > win_h {
                return Err(format_err(format!(
                    "feature rect {text:?} exceeds the {win_w}x{win_h} window"
                )));
            }
            Ok(rect)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rects.is_empty() {
        return Err(format_err("feature without rects"));
    }
    Ok(HaarFeature { rects })
}

/// First element child named `name`.
fn element<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Result<Node<'a, 'i>, ModelLoadError> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .ok_or_else(|| format_err(format!("missing <{name}>")))
}

/// Sequence entries (`<_>` children).
fn items<'a, 'i: 'a>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "_")
}

fn text_of<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, ModelLoadError> {
    Ok(element(node, name)?.text().unwrap_or_default().trim())
}

fn parse_child<T: FromStr>(node: Node, name: &str) -> Result<T, ModelLoadError> {
    let text = text_of(node, name)?;
    text.parse()
        .map_err(|_| format_err(format!("<{name}> is not a valid number: {text:?}")))
}

fn parse_token<T: FromStr>(token: &str) -> Result<T, ModelLoadError> {
    token
        .parse()
        .map_err(|_| format_err(format!("invalid number {token:?}")))
}

fn parse_list<T: FromStr>(text: &str) -> Result<Vec<T>, ModelLoadError> {
    text.split_whitespace().map(parse_token).collect()
}
