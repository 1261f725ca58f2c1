use crate::utils::error::DetectionError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 森林覆盖类别，顺序与模型输出的logits一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForestLabel {
    #[serde(rename = "deforested")]
    Deforested,
    #[serde(rename = "non-deforested")]
    NonDeforested,
}

impl ForestLabel {
    /// 模型输出顺序: [deforested, non-deforested]
    pub const ALL: [ForestLabel; 2] = [ForestLabel::Deforested, ForestLabel::NonDeforested];

    pub fn as_str(self) -> &'static str {
        match self {
            ForestLabel::Deforested => "deforested",
            ForestLabel::NonDeforested => "non-deforested",
        }
    }
}

impl fmt::Display for ForestLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// softmax输出的二分类概率
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassProbabilities {
    pub deforested: f32,
    #[serde(rename = "non-deforested")]
    pub non_deforested: f32,
}

impl ClassProbabilities {
    /// 从按类别顺序排列的概率切片构造
    pub fn from_slice(probs: &[f32]) -> Result<Self> {
        match probs {
            [deforested, non_deforested] => Ok(Self {
                deforested: *deforested,
                non_deforested: *non_deforested,
            }),
            other => Err(DetectionError::ShapeMismatch {
                expected: vec![ForestLabel::ALL.len()],
                actual: vec![other.len()],
            }),
        }
    }

    pub fn get(&self, label: ForestLabel) -> f32 {
        match label {
            ForestLabel::Deforested => self.deforested,
            ForestLabel::NonDeforested => self.non_deforested,
        }
    }

    /// top-1类别；两者完全相等时取第一个类别（deforested）
    pub fn argmax(&self) -> ForestLabel {
        if self.non_deforested > self.deforested {
            ForestLabel::NonDeforested
        } else {
            ForestLabel::Deforested
        }
    }

    pub fn sum(&self) -> f32 {
        self.deforested + self.non_deforested
    }

    pub fn is_valid(&self, tolerance: f32) -> bool {
        (0.0..=1.0).contains(&self.deforested)
            && (0.0..=1.0).contains(&self.non_deforested)
            && (self.sum() - 1.0).abs() <= tolerance
    }
}

/// 单张图像的分类结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub prediction: ForestLabel,
    /// 预测类别的概率，保留3位小数
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(prediction: ForestLabel, confidence: f64) -> Self {
        Self { prediction, confidence }
    }

    pub fn from_probabilities(probs: &ClassProbabilities) -> Self {
        let prediction = probs.argmax();
        Self {
            prediction,
            confidence: round_confidence(probs.get(prediction)),
        }
    }
}

pub fn round_confidence(prob: f32) -> f64 {
    (f64::from(prob) * 1000.0).round() / 1000.0
}

/// 前后两张图像对比得出的变化结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeVerdict {
    #[serde(rename = "⚠️ Deforestation detected")]
    DeforestationDetected,
    #[serde(rename = "🌱 Reforestation detected")]
    ReforestationDetected,
    #[serde(rename = "✅ No significant change detected")]
    NoChange,
}

impl ChangeVerdict {
    /// 决策表：只看两次预测的类别，不看置信度
    pub fn from_labels(before: ForestLabel, after: ForestLabel) -> Self {
        use ForestLabel::*;

        match (before, after) {
            (NonDeforested, Deforested) => ChangeVerdict::DeforestationDetected,
            (Deforested, NonDeforested) => ChangeVerdict::ReforestationDetected,
            (Deforested, Deforested) | (NonDeforested, NonDeforested) => ChangeVerdict::NoChange,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ChangeVerdict::DeforestationDetected => "deforestation_detected",
            ChangeVerdict::ReforestationDetected => "reforestation_detected",
            ChangeVerdict::NoChange => "no_change",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ChangeVerdict::DeforestationDetected => "⚠️ Deforestation detected",
            ChangeVerdict::ReforestationDetected => "🌱 Reforestation detected",
            ChangeVerdict::NoChange => "✅ No significant change detected",
        }
    }
}

impl fmt::Display for ChangeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// 对比结果，字段名与前端约定一致
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(rename = "Before_Image")]
    pub before: ClassificationResult,
    #[serde(rename = "After_Image")]
    pub after: ClassificationResult,
    #[serde(rename = "Change_Detected")]
    pub verdict: ChangeVerdict,
}

impl ComparisonResult {
    pub fn from_results(before: ClassificationResult, after: ClassificationResult) -> Self {
        Self {
            before,
            after,
            verdict: ChangeVerdict::from_labels(before.prediction, after.prediction),
        }
    }
}
