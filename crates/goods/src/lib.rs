//! Goods requests drawing inventory for jobs.

pub mod request;

pub use request::{
    ApproveGoodsRequest, CreateGoodsRequest, GoodsCommand, GoodsEvent, GoodsRequest,
    GoodsRequestCreated, GoodsRequestId, GoodsRequestStatus, GoodsRequestLine, RejectGoodsRequest,
    ReleaseGoodsRequest,
};
