//! Generated gRPC message and service types for [`MetadataService`] and
//! [`DataNodeService`], compiled from `proto/chunkstore.proto` by `build.rs`.

tonic::include_proto!("chunkstore");
