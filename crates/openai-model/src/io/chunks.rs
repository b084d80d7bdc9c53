#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

#[derive(Debug, PartialEq, Eq)]
pub struct Error(pub String);

/// A source of body chunks: a live HTTP response, or canned bytes in tests.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    Canned(VecDeque<Bytes>),
}

impl Chunks {
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn canned<I: IntoIterator<Item = &'static [u8]>>(chunks: I) -> Self {
        Chunks::Canned(chunks.into_iter().map(Bytes::from_static).collect())
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => response
                .chunk()
                .await
                .map_err(|err| Error(format!("{err}"))),
            #[cfg(test)]
            Chunks::Canned(chunks) => Ok(chunks.pop_front()),
        }
    }
}
