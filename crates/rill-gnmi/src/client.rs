//! gRPC client for the OpenConfig service, written in the idiom of
//! tonic-generated client code.

use crate::proto;

pub mod openconfig_client {
    use super::proto;
    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct OpenConfigClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl OpenConfigClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> OpenConfigClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Bidirectional subscribe stream: the client sends one
        /// subscription list; the server streams notifications,
        /// heartbeats, and a sync marker.
        pub async fn subscribe(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = proto::SubscribeRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<proto::SubscribeResponse>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/openconfig.OpenConfig/Subscribe");
            let mut req = request.into_streaming_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("openconfig.OpenConfig", "Subscribe"));
            self.inner.streaming(req, path, codec).await
        }

        /// Unary snapshot fetch for the given paths.
        pub async fn get(
            &mut self,
            request: impl tonic::IntoRequest<proto::GetRequest>,
        ) -> std::result::Result<tonic::Response<proto::GetResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/openconfig.OpenConfig/Get");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("openconfig.OpenConfig", "Get"));
            self.inner.unary(req, path, codec).await
        }
    }
}

pub use openconfig_client::OpenConfigClient;
