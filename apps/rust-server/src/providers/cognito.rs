// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cognito user pool client.
//!
//! The operations used here are the public ones: they are authorized by the
//! app client id (plus `SECRET_HASH` when the client has a secret) or by the
//! caller's access token.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cognitoidentityprovider::{
    types::{AttributeType, AuthFlowType, AuthenticationResultType},
    Client,
};
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use super::UpstreamError;
use crate::config::IdentityConfig;
use crate::models::{TokenSet, UserProfile};

type HmacSha256 = Hmac<Sha256>;

/// A user to register.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn to_sdk(&self) -> Result<AttributeType, UpstreamError> {
        AttributeType::builder()
            .name(&self.name)
            .value(&self.value)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("invalid user attribute: {e}")))
    }
}

/// Identity operations the handlers rely on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a user; returns the new user's `sub`.
    async fn sign_up(&self, user: NewUser) -> Result<String, UpstreamError>;

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), UpstreamError>;

    /// Password login.
    async fn initiate_auth(&self, username: &str, password: &str)
        -> Result<TokenSet, UpstreamError>;

    /// Exchange a refresh token. `username` is only needed to compute the
    /// secret hash when the app client has a secret.
    async fn refresh(
        &self,
        refresh_token: &str,
        username: Option<&str>,
    ) -> Result<TokenSet, UpstreamError>;

    async fn forgot_password(&self, username: &str) -> Result<(), UpstreamError>;

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), UpstreamError>;

    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), UpstreamError>;

    async fn get_user(&self, access_token: &str) -> Result<UserProfile, UpstreamError>;

    async fn update_user_attributes(
        &self,
        access_token: &str,
        attributes: Vec<UserAttribute>,
    ) -> Result<(), UpstreamError>;

    async fn global_sign_out(&self, access_token: &str) -> Result<(), UpstreamError>;
}

#[derive(Clone)]
pub struct CognitoClient {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
}

impl CognitoClient {
    pub fn new(sdk: &SdkConfig, config: &IdentityConfig) -> Self {
        let mut builder = aws_sdk_cognitoidentityprovider::config::Builder::from(sdk);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.as_str());
        }

        Self {
            client: Client::from_conf(builder.build()),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// `SECRET_HASH` for `username`, when the app client has a secret.
    fn secret_hash(&self, username: &str) -> Result<Option<String>, UpstreamError> {
        let Some(secret) = &self.client_secret else {
            return Ok(None);
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| UpstreamError::Transport(format!("invalid client secret: {e}")))?;
        mac.update(username.as_bytes());
        mac.update(self.client_id.as_bytes());
        Ok(Some(Base64::encode_string(&mac.finalize().into_bytes())))
    }

    async fn authenticate(
        &self,
        flow: AuthFlowType,
        params: HashMap<String, String>,
    ) -> Result<TokenSet, UpstreamError> {
        let output = self
            .client
            .initiate_auth()
            .auth_flow(flow)
            .client_id(&self.client_id)
            .set_auth_parameters(Some(params))
            .send()
            .await?;

        match (output.authentication_result(), output.challenge_name()) {
            (Some(result), _) => token_set(result),
            (None, Some(challenge)) => {
                debug!(challenge = challenge.as_str(), "pool answered with a challenge");
                Err(UpstreamError::ChallengeRequired(challenge.as_str().to_string()))
            }
            (None, None) => Err(UpstreamError::InvalidResponse(
                "InitiateAuth returned neither tokens nor a challenge".into(),
            )),
        }
    }
}

fn token_set(result: &AuthenticationResultType) -> Result<TokenSet, UpstreamError> {
    let required = |value: Option<&str>, name: &str| {
        value
            .map(str::to_string)
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("authentication result has no {name}")))
    };

    Ok(TokenSet {
        id_token: required(result.id_token(), "IdToken")?,
        access_token: required(result.access_token(), "AccessToken")?,
        refresh_token: result.refresh_token().map(str::to_string),
        expires_in: i64::from(result.expires_in()),
    })
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    async fn sign_up(&self, user: NewUser) -> Result<String, UpstreamError> {
        let mut attributes = vec![
            UserAttribute::new("email", &user.email),
            UserAttribute::new("name", user.name.as_deref().unwrap_or(&user.username)),
        ];
        if let Some(phone) = &user.phone_number {
            attributes.push(UserAttribute::new("phone_number", phone));
        }
        let attributes = attributes
            .iter()
            .map(UserAttribute::to_sdk)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .username(&user.username)
            .password(&user.password)
            .set_secret_hash(self.secret_hash(&user.username)?)
            .set_user_attributes(Some(attributes))
            .send()
            .await?;
        Ok(output.user_sub().to_string())
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), UpstreamError> {
        self.client
            .confirm_sign_up()
            .client_id(&self.client_id)
            .username(username)
            .confirmation_code(code)
            .set_secret_hash(self.secret_hash(username)?)
            .send()
            .await?;
        Ok(())
    }

    async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenSet, UpstreamError> {
        let mut params = HashMap::from([
            ("USERNAME".to_string(), username.to_string()),
            ("PASSWORD".to_string(), password.to_string()),
        ]);
        if let Some(hash) = self.secret_hash(username)? {
            params.insert("SECRET_HASH".to_string(), hash);
        }
        self.authenticate(AuthFlowType::UserPasswordAuth, params).await
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        username: Option<&str>,
    ) -> Result<TokenSet, UpstreamError> {
        let mut params = HashMap::from([("REFRESH_TOKEN".to_string(), refresh_token.to_string())]);
        if let Some(username) = username {
            if let Some(hash) = self.secret_hash(username)? {
                params.insert("SECRET_HASH".to_string(), hash);
            }
        }
        self.authenticate(AuthFlowType::RefreshTokenAuth, params).await
    }

    async fn forgot_password(&self, username: &str) -> Result<(), UpstreamError> {
        self.client
            .forgot_password()
            .client_id(&self.client_id)
            .username(username)
            .set_secret_hash(self.secret_hash(username)?)
            .send()
            .await?;
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), UpstreamError> {
        self.client
            .confirm_forgot_password()
            .client_id(&self.client_id)
            .username(username)
            .confirmation_code(code)
            .password(new_password)
            .set_secret_hash(self.secret_hash(username)?)
            .send()
            .await?;
        Ok(())
    }

    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), UpstreamError> {
        self.client
            .change_password()
            .access_token(access_token)
            .previous_password(old_password)
            .proposed_password(new_password)
            .send()
            .await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<UserProfile, UpstreamError> {
        let output = self.client.get_user().access_token(access_token).send().await?;

        Ok(UserProfile {
            username: output.username().to_string(),
            attributes: output
                .user_attributes()
                .iter()
                .map(|attr| {
                    (
                        attr.name().to_string(),
                        attr.value().unwrap_or_default().to_string(),
                    )
                })
                .collect(),
        })
    }

    async fn update_user_attributes(
        &self,
        access_token: &str,
        attributes: Vec<UserAttribute>,
    ) -> Result<(), UpstreamError> {
        let attributes = attributes
            .iter()
            .map(UserAttribute::to_sdk)
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .update_user_attributes()
            .access_token(access_token)
            .set_user_attributes(Some(attributes))
            .send()
            .await?;
        Ok(())
    }

    async fn global_sign_out(&self, access_token: &str) -> Result<(), UpstreamError> {
        self.client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await?;
        Ok(())
    }
}
