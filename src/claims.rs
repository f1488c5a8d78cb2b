use serde::{Deserialize, Serialize};

use crate::AuthProperties;

pub mod claim_types {
    pub const NAME_IDENTIFIER: &str = "nameidentifier";
    pub const NAME: &str = "name";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const EMAIL: &str = "email";
    pub const AVATAR: &str = "avatar";
    pub const PROFILE: &str = "profile";
    pub const PROFILE_API: &str = "profile.api";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub issuer: String,
}

/// Ordered claims about one authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsIdentity {
    authentication_type: String,
    issuer: String,
    claims: Vec<Claim>,
}

impl ClaimsIdentity {
    pub fn new(authentication_type: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            authentication_type: authentication_type.into(),
            issuer: issuer.into(),
            claims: Vec::new(),
        }
    }

    pub fn authentication_type(&self) -> &str {
        &self.authentication_type
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn add_claim(&mut self, claim_type: impl Into<String>, value: impl Into<String>) {
        self.claims.push(Claim {
            claim_type: claim_type.into(),
            value: value.into(),
            issuer: self.issuer.clone(),
        });
    }

    pub fn has_claim(&self, claim_type: &str) -> bool {
        self.claims.iter().any(|claim| claim.claim_type == claim_type)
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.claim_type == claim_type)
            .map(|claim| claim.value.as_str())
    }

    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |claim| claim.claim_type == claim_type)
            .map(|claim| claim.value.as_str())
    }

    /// Removes every claim of the given type, returning how many were removed.
    pub fn remove_claims(&mut self, claim_type: &str) -> usize {
        let before = self.claims.len();
        self.claims.retain(|claim| claim.claim_type != claim_type);
        before - self.claims.len()
    }
}

/// The result of a successful sign-in, handed to the host's session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub identity: ClaimsIdentity,
    pub properties: AuthProperties,
    pub scheme: String,
}
