//! ZB authenticated WebSocket requests
//!
//! Every request is an `addChannel` command carrying the access key, a fresh
//! `no` and an HMAC signature, answered by a reply with the same `no`.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::instrument::Instrument;
use crate::model::TradeSide;
use crate::zb::messages::{
    trade_type, AccountInfo, AddSubUserParams, AuthenticatedCommand, CreateSubUserKeyParams,
    KeyPermissions, NoParams, OrderIdParams, OrderParams, OrderRecord, OrdersIgnoreTypeParams,
    OrdersPageParams, RequestAck, SubUser, SubmittedOrder, TransferFundsParams, ADD_CHANNEL,
};

pub struct ZbApi {
    gateway: Arc<Gateway>,
}

impl ZbApi {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    fn channel(&self, instrument: &Instrument, suffix: &str) -> String {
        format!("{}_{}", self.gateway.profile().venue_symbol(instrument), suffix)
    }

    /// Sign and send one command, returning the raw reply
    async fn send<P: Serialize>(&self, channel: String, params: P) -> Result<Vec<u8>, GatewayError> {
        let signer = self.gateway.signer()?;
        debug!(exchange = %self.gateway.name(), channel = %channel, "Authenticated request");

        self.gateway
            .send_and_wait(self.gateway.request_timeout(), |no| {
                let mut command = AuthenticatedCommand {
                    accesskey: signer.access_key().to_string(),
                    channel,
                    event: ADD_CHANNEL,
                    no,
                    params,
                    sign: None,
                };
                command.sign = Some(signer.sign(&command)?);
                Ok(command)
            })
            .await
    }

    async fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        channel: String,
        params: P,
    ) -> Result<R, GatewayError> {
        let reply = self.send(channel, params).await?;
        self.gateway.classifier().decode_reply(&reply)
    }

    async fn acknowledge<P: Serialize>(
        &self,
        channel: String,
        params: P,
    ) -> Result<RequestAck, GatewayError> {
        let reply = self.send(channel, params).await?;
        self.gateway.classifier().check_reply(&reply)?;
        Ok(serde_json::from_slice(&reply)?)
    }

    pub async fn get_account_info(&self) -> Result<AccountInfo, GatewayError> {
        self.request("getaccountinfo".to_string(), NoParams {}).await
    }

    pub async fn add_sub_user(&self, username: &str, password: &str) -> Result<RequestAck, GatewayError> {
        self.acknowledge(
            "addSubUser".to_string(),
            AddSubUserParams {
                memo: "memo",
                password: password.to_string(),
                sub_user_name: username.to_string(),
            },
        )
        .await
    }

    pub async fn get_sub_user_list(&self) -> Result<Vec<SubUser>, GatewayError> {
        self.request("getSubUserList".to_string(), NoParams {}).await
    }

    pub async fn do_transfer_funds(
        &self,
        currency: &str,
        amount: Decimal,
        from_user_name: &str,
        to_user_name: &str,
    ) -> Result<RequestAck, GatewayError> {
        self.acknowledge(
            "doTransferFunds".to_string(),
            TransferFundsParams {
                amount,
                currency: currency.to_lowercase(),
                from_user_name: from_user_name.to_string(),
                to_user_name: to_user_name.to_string(),
            },
        )
        .await
    }

    pub async fn create_sub_user_key(
        &self,
        permissions: KeyPermissions,
        key_name: &str,
        to_user_id: &str,
    ) -> Result<RequestAck, GatewayError> {
        self.acknowledge(
            "createSubUserKey".to_string(),
            CreateSubUserKeyParams {
                permissions,
                key_name: key_name.to_string(),
                to_user_id: to_user_id.to_string(),
            },
        )
        .await
    }

    pub async fn submit_order(
        &self,
        instrument: &Instrument,
        amount: Decimal,
        price: Decimal,
        side: TradeSide,
    ) -> Result<SubmittedOrder, GatewayError> {
        self.request(
            self.channel(instrument, "order"),
            OrderParams {
                amount,
                price,
                trade_type: trade_type(side),
            },
        )
        .await
    }

    pub async fn cancel_order(&self, instrument: &Instrument, order_id: i64) -> Result<RequestAck, GatewayError> {
        self.acknowledge(
            self.channel(instrument, "cancelorder"),
            OrderIdParams { id: order_id },
        )
        .await
    }

    pub async fn get_order(&self, instrument: &Instrument, order_id: i64) -> Result<OrderRecord, GatewayError> {
        self.request(
            self.channel(instrument, "getorder"),
            OrderIdParams { id: order_id },
        )
        .await
    }

    /// One page of orders on one side
    pub async fn get_orders(
        &self,
        instrument: &Instrument,
        page_index: u32,
        side: TradeSide,
    ) -> Result<Vec<OrderRecord>, GatewayError> {
        self.request(
            self.channel(instrument, "getorders"),
            OrdersPageParams {
                page_index,
                trade_type: trade_type(side),
            },
        )
        .await
    }

    pub async fn get_orders_ignore_trade_type(
        &self,
        instrument: &Instrument,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<OrderRecord>, GatewayError> {
        self.request(
            self.channel(instrument, "getordersignoretradetype"),
            OrdersIgnoreTypeParams {
                page_index,
                page_size,
            },
        )
        .await
    }
}
