use secrecy::SecretString;

/// AWS credentials and endpoint configuration for the Bedrock Converse client.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region the Bedrock Converse client targets.
    #[serde(default = "default_region")]
    pub region: String,

    /// Explicit access key id. When absent, the AWS SDK's default credential
    /// chain (environment, profile, instance metadata) is used instead.
    pub access_key_id: Option<String>,

    /// Explicit secret access key, paired with `access_key_id`.
    pub secret_access_key: Option<SecretString>,

    /// Explicit session token for temporary credentials.
    pub session_token: Option<SecretString>,

    /// Override endpoint URL, used to point at a local Bedrock stub in tests.
    pub bedrock_endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl AwsConfig {
    pub(crate) fn validate(&self) -> Result<(), crate::Error> {
        if self.region.trim().is_empty() {
            return Err(crate::Error::Invalid {
                key: "aws.region".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
