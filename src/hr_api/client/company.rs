use log::debug;
use serde::Serialize;

use super::core::HrApiClient;
use crate::auth::Token;
use crate::error::Result;
use crate::hr_api::types::{Company, TokenIntrospection};

#[derive(Serialize)]
struct IntrospectRequest<'a> {
    token: &'a str,
}

impl HrApiClient {
    /// Validates the token against the issuing authority.
    ///
    /// An inactive token is a normal response here; deciding that it is fatal
    /// is left to the caller.
    pub async fn introspect_token(&self, token: &Token) -> Result<TokenIntrospection> {
        let url = self.auth_endpoint(&["introspect"]);
        debug!("POST {url}");

        let request = self.auth_request(
            self.client().post(url).json(&IntrospectRequest {
                token: token.as_str(),
            }),
            token,
        );

        let response = self.send_checked(request, "introspecting the token").await?;
        let body = response.bytes().await?;

        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn get_company(&self, token: &Token, company_id: &str) -> Result<Company> {
        let url = self.api_endpoint(&["companies", company_id]);
        debug!("GET {url}");

        let request = self.auth_request(self.client().get(url), token);
        let response = self.send_checked(request, "fetching the company").await?;
        let body = response.bytes().await?;

        let mut company: Company = serde_json::from_slice(&body)?;
        if company.id.is_empty() {
            company.id = company_id.to_string();
        }

        Ok(company)
    }
}
