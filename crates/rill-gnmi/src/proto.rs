//! Hand-maintained OpenConfig RPC message subset, kept in the idiom of
//! prost-generated code so a future switch to build-time codegen is a
//! drop-in.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Path {
    #[prost(string, repeated, tag = "1")]
    pub element: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Value {
    #[prost(bytes = "vec", tag = "1")]
    pub value: ::prost::alloc::vec::Vec<u8>,
    #[prost(enumeration = "Encoding", tag = "2")]
    pub r#type: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Encoding {
    Json = 0,
    Bytes = 1,
    Proto = 2,
    Ascii = 3,
}

impl Encoding {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Encoding::Json => "JSON",
            Encoding::Bytes => "BYTES",
            Encoding::Proto => "PROTO",
            Encoding::Ascii => "ASCII",
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Update {
    #[prost(message, optional, tag = "1")]
    pub path: ::core::option::Option<Path>,
    #[prost(message, optional, tag = "3")]
    pub value: ::core::option::Option<Value>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Notification {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "2")]
    pub prefix: ::core::option::Option<Path>,
    #[prost(message, repeated, tag = "4")]
    pub update: ::prost::alloc::vec::Vec<Update>,
    #[prost(message, repeated, tag = "5")]
    pub delete: ::prost::alloc::vec::Vec<Path>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Subscription {
    #[prost(message, optional, tag = "1")]
    pub path: ::core::option::Option<Path>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscriptionList {
    #[prost(message, repeated, tag = "1")]
    pub subscription: ::prost::alloc::vec::Vec<Subscription>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeRequest {
    #[prost(oneof = "subscribe_request::Request", tags = "1")]
    pub request: ::core::option::Option<subscribe_request::Request>,
}

/// Nested message and enum types in `SubscribeRequest`.
pub mod subscribe_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        Subscribe(super::SubscriptionList),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Heartbeat {
    #[prost(uint64, tag = "1")]
    pub interval: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeResponse {
    #[prost(oneof = "subscribe_response::Response", tags = "1, 2, 3")]
    pub response: ::core::option::Option<subscribe_response::Response>,
}

/// Nested message and enum types in `SubscribeResponse`.
pub mod subscribe_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        Update(super::Notification),
        #[prost(message, tag = "2")]
        Heartbeat(super::Heartbeat),
        #[prost(bool, tag = "3")]
        SyncResponse(bool),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(message, repeated, tag = "1")]
    pub path: ::prost::alloc::vec::Vec<Path>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResponse {
    #[prost(message, repeated, tag = "1")]
    pub notification: ::prost::alloc::vec::Vec<Notification>,
}

impl Path {
    /// Builds a wire path from a `/`-separated string. `/` and the empty
    /// string both denote the empty path.
    pub fn from_slash_string(s: &str) -> Path {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Path::default();
        }
        Path {
            element: trimmed.split('/').map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn subscribe_request_roundtrips() {
        let request = SubscribeRequest {
            request: Some(subscribe_request::Request::Subscribe(SubscriptionList {
                subscription: vec![Subscription {
                    path: Some(Path::from_slash_string("/interfaces/status")),
                }],
            })),
        };
        let bytes = request.encode_to_vec();
        let decoded = SubscribeRequest::decode(bytes.as_slice()).expect("should decode");
        assert_eq!(request, decoded);
    }

    #[test]
    fn slash_string_paths() {
        assert_eq!(Path::from_slash_string("/").element.len(), 0);
        assert_eq!(Path::from_slash_string("").element.len(), 0);
        assert_eq!(
            Path::from_slash_string("/a/b").element,
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn response_oneof_discriminates() {
        let response = SubscribeResponse {
            response: Some(subscribe_response::Response::SyncResponse(true)),
        };
        let decoded =
            SubscribeResponse::decode(response.encode_to_vec().as_slice()).expect("should decode");
        assert!(matches!(
            decoded.response,
            Some(subscribe_response::Response::SyncResponse(true))
        ));
    }
}
