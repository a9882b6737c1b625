use std::marker::PhantomData;
use std::vec::IntoIter;

use failure::{Error, ResultExt};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LINK, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Credentials;

pub(crate) const API_MIME_TYPE: &str = "application/vnd.github.v3+json";
pub(crate) const AGENT: &str = "git-backup";

/// Build and send a `GET` request, attaching whichever auth header the
/// credentials call for.
pub(crate) fn api_get(
    client: &Client,
    credentials: &Credentials,
    endpoint: &str,
) -> Result<Response, Error> {
    debug!("Sending request to {:?}", endpoint);

    let request = client
        .get(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .header(USER_AGENT, AGENT)
        .header(ACCEPT, API_MIME_TYPE);

    let request = match *credentials {
        Credentials::Token(ref token) => {
            request.header(AUTHORIZATION, format!("token {}", token))
        }
        Credentials::Basic {
            ref user,
            ref password,
        } => request.basic_auth(user, Some(password)),
        Credentials::Anonymous => request,
    };

    let request = request
        .build()
        .context("Generated invalid request. This is a bug.")?;

    let response = client
        .execute(request)
        .context("Unable to send request")?;

    Ok(response)
}

/// An iterator over each item in a paginated API listing, following the
/// `Link` header until there is no `next` page.
pub(crate) struct Paginated<I>
where
    I: for<'de> Deserialize<'de>,
{
    client: Client,
    credentials: Credentials,
    _phantom: PhantomData<I>,
    next_endpoint: Option<String>,
    items: IntoIter<I>,
}

impl<I> Paginated<I>
where
    for<'de> I: Deserialize<'de>,
{
    pub fn new(client: &Client, credentials: &Credentials, endpoint: &str) -> Paginated<I> {
        Paginated {
            client: client.clone(),
            credentials: credentials.clone(),
            _phantom: PhantomData,
            next_endpoint: Some(String::from(endpoint)),
            items: Vec::new().into_iter(),
        }
    }

    fn send_request(&mut self, endpoint: &str) -> Result<Vec<I>, Error> {
        let response = api_get(&self.client, &self.credentials, endpoint)?;

        let status = response.status();
        debug!("Received response ({})", status);

        // The body can only be read once, so the next page's location has to
        // be pulled out of the headers first.
        self.next_endpoint = response
            .headers()
            .get(LINK)
            .and_then(|raw| raw.to_str().ok())
            .and_then(next_link);

        let raw: Value = response.json().context("Unable to read the response")?;

        if log_enabled!(log::Level::Trace) {
            trace!("Body:");
            for line in serde_json::to_string_pretty(&raw).unwrap().lines() {
                trace!("{}", line);
            }
        }

        if !status.is_success() {
            warn!("Request failed with {}", status);

            let err = FailedRequest {
                status,
                url: endpoint.to_string(),
            };

            return Err(err.into());
        }

        let got = serde_json::from_value(raw).context("Unable to deserialize response")?;

        Ok(got)
    }
}

impl<I> Iterator for Paginated<I>
where
    for<'de> I: Deserialize<'de>,
{
    type Item = Result<I, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(next_item) = self.items.next() {
            return Some(Ok(next_item));
        }

        if let Some(next_endpoint) = self.next_endpoint.take() {
            match self.send_request(&next_endpoint) {
                Ok(values) => {
                    self.items = values.into_iter();
                    return self.items.next().map(|it| Ok(it));
                }
                Err(e) => {
                    return Some(Err(e));
                }
            }
        }

        None
    }
}

#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Request failed with {}", status)]
pub(crate) struct FailedRequest {
    pub status: StatusCode,
    pub url: String,
}

/// Pull the `rel="next"` URL out of a `Link` header.
fn next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut pieces = part.trim().split(';');
        let url = pieces.next()?.trim();

        let is_next = pieces.any(|param| param.trim() == r#"rel="next""#);

        if is_next && url.starts_with('<') && url.ends_with('>') {
            return Some(url[1..url.len() - 1].to_string());
        }
    }

    None
}
