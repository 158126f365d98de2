pub mod gateway;

pub use gateway::{
    Account, Charge, ChargeRequest, Gateway, StripeGateway, Transfer, TransferRequest,
};
