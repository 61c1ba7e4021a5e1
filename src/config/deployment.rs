//! Typed description of the hosted model deployment.
//!
//! Provisioning itself happens outside this service; these types only
//! mirror the deployment file so the relay can derive the endpoint name
//! and refuse to start on an inconsistent endpoint variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RelayError, Result};

pub const VARIANT_NAME: &str = "AllTraffic";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub model: ModelConfig,
    pub endpoint: EndpointConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub hf_model_id: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "TinyLlama-1-1B-Chat".to_string(),
            hf_model_id: "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointType {
    #[default]
    RealTime,
    Serverless,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    #[serde(rename = "type")]
    pub endpoint_type: EndpointType,
    pub real_time: RealTimeEndpointConfig,
    pub serverless: ServerlessEndpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealTimeEndpointConfig {
    pub instance_type: String,
    pub initial_instance_count: u32,
}

impl Default for RealTimeEndpointConfig {
    fn default() -> Self {
        Self {
            instance_type: "ml.g4dn.xlarge".to_string(),
            initial_instance_count: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerlessEndpointConfig {
    pub memory_size_in_mb: u32,
    pub max_concurrency: u32,
}

impl Default for ServerlessEndpointConfig {
    fn default() -> Self {
        Self {
            memory_size_in_mb: 3072,
            max_concurrency: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub name: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            name: "TinyLlama-LLM-API".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantCapacity {
    Instances {
        instance_type: String,
        initial_instance_count: u32,
    },
    Serverless {
        memory_size_in_mb: u32,
        max_concurrency: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductionVariant {
    pub variant_name: String,
    pub model_name: String,
    pub initial_variant_weight: f64,
    pub capacity: VariantCapacity,
}

impl fmt::Display for ProductionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.capacity {
            VariantCapacity::Instances {
                instance_type,
                initial_instance_count,
            } => write!(
                f,
                "{} (weight {}, model {}, {} x {})",
                self.variant_name,
                self.initial_variant_weight,
                self.model_name,
                initial_instance_count,
                instance_type
            ),
            VariantCapacity::Serverless {
                memory_size_in_mb,
                max_concurrency,
            } => write!(
                f,
                "{} (weight {}, model {}, serverless {} MB, max concurrency {})",
                self.variant_name,
                self.initial_variant_weight,
                self.model_name,
                memory_size_in_mb,
                max_concurrency
            ),
        }
    }
}

impl DeploymentConfig {
    pub fn endpoint_name(&self) -> String {
        format!("{}-endpoint", self.model.name)
    }

    pub fn endpoint_config_name(&self) -> String {
        format!("{}-config", self.model.name)
    }

    pub fn api_key_name(&self) -> String {
        format!("{}-key", self.api.name)
    }

    pub fn usage_plan_name(&self) -> String {
        format!("{}-usage-plan", self.api.name)
    }

    /// Resolves the variant for the selected endpoint type. Only the
    /// selected section is checked; the other may hold anything.
    pub fn production_variant(&self) -> Result<ProductionVariant> {
        if self.model.name.trim().is_empty() {
            return Err(RelayError::Config("deployment.model.name is required".into()));
        }
        let capacity = match self.endpoint.endpoint_type {
            EndpointType::RealTime => {
                let rt = &self.endpoint.real_time;
                if rt.instance_type.trim().is_empty() || rt.initial_instance_count == 0 {
                    return Err(RelayError::Config(
                        "instance_type and initial_instance_count are required for real-time endpoints"
                            .into(),
                    ));
                }
                VariantCapacity::Instances {
                    instance_type: rt.instance_type.clone(),
                    initial_instance_count: rt.initial_instance_count,
                }
            }
            EndpointType::Serverless => {
                let sl = &self.endpoint.serverless;
                if sl.memory_size_in_mb == 0 || sl.max_concurrency == 0 {
                    return Err(RelayError::Config(
                        "memory_size_in_mb and max_concurrency are required for serverless endpoints"
                            .into(),
                    ));
                }
                VariantCapacity::Serverless {
                    memory_size_in_mb: sl.memory_size_in_mb,
                    max_concurrency: sl.max_concurrency,
                }
            }
        };
        Ok(ProductionVariant {
            variant_name: VARIANT_NAME.to_string(),
            model_name: self.model.name.clone(),
            initial_variant_weight: 1.0,
            capacity,
        })
    }

    /// Environment handed to the text-generation-inference container.
    pub fn container_environment(&self) -> Vec<(&'static str, String)> {
        vec![
            ("HF_MODEL_ID", self.model.hf_model_id.clone()),
            ("HF_TASK", "text-generation".to_string()),
            ("MAX_INPUT_LENGTH", "2048".to_string()),
            ("MAX_TOTAL_TOKENS", "4096".to_string()),
            ("SM_NUM_GPUS", "1".to_string()),
            ("MAX_BATCH_PREFILL_TOKENS", "4096".to_string()),
            ("MAX_BATCH_TOTAL_TOKENS", "8192".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derive_from_model_and_api() {
        let d = DeploymentConfig::default();
        assert_eq!(d.endpoint_name(), "TinyLlama-1-1B-Chat-endpoint");
        assert_eq!(d.endpoint_config_name(), "TinyLlama-1-1B-Chat-config");
        assert_eq!(d.api_key_name(), "TinyLlama-LLM-API-key");
        assert_eq!(d.usage_plan_name(), "TinyLlama-LLM-API-usage-plan");
    }

    #[test]
    fn real_time_variant_uses_instances() {
        let v = DeploymentConfig::default().production_variant().unwrap();
        assert_eq!(v.variant_name, "AllTraffic");
        assert_eq!(v.initial_variant_weight, 1.0);
        assert_eq!(
            v.capacity,
            VariantCapacity::Instances {
                instance_type: "ml.g4dn.xlarge".into(),
                initial_instance_count: 1,
            }
        );
        assert_eq!(
            v.to_string(),
            "AllTraffic (weight 1, model TinyLlama-1-1B-Chat, 1 x ml.g4dn.xlarge)"
        );
    }

    #[test]
    fn serverless_variant_uses_memory_and_concurrency() {
        let mut d = DeploymentConfig::default();
        d.endpoint.endpoint_type = EndpointType::Serverless;
        let v = d.production_variant().unwrap();
        assert_eq!(
            v.capacity,
            VariantCapacity::Serverless {
                memory_size_in_mb: 3072,
                max_concurrency: 10,
            }
        );
    }

    #[test]
    fn missing_settings_for_selected_variant_are_rejected() {
        let mut d = DeploymentConfig::default();
        d.endpoint.endpoint_type = EndpointType::Serverless;
        d.endpoint.serverless.max_concurrency = 0;
        assert!(matches!(d.production_variant(), Err(RelayError::Config(_))));

        // the unselected section is not checked
        d.endpoint.endpoint_type = EndpointType::RealTime;
        d.production_variant().unwrap();

        d.endpoint.real_time.instance_type = String::new();
        assert!(matches!(d.production_variant(), Err(RelayError::Config(_))));
    }

    #[test]
    fn endpoint_type_parses_kebab_case() {
        let d: DeploymentConfig = toml::from_str(
            r#"
[endpoint]
type = "serverless"

[endpoint.serverless]
memory_size_in_mb = 6144
"#,
        )
        .unwrap();
        assert_eq!(d.endpoint.endpoint_type, EndpointType::Serverless);
        assert_eq!(d.endpoint.serverless.memory_size_in_mb, 6144);
        assert_eq!(d.endpoint.serverless.max_concurrency, 10);
    }

    #[test]
    fn container_environment_carries_model_id() {
        let env = DeploymentConfig::default().container_environment();
        assert!(env.contains(&("HF_MODEL_ID", "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string())));
        assert!(env.contains(&("HF_TASK", "text-generation".to_string())));
    }
}
