//! Subnet lookup through EC2 DescribeSubnets

use crate::context::AwsContext;
use crate::error::classify_sdk_error;
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_ec2::Client;
use hyperpod_core::{SubnetDirectory, SubnetPlacement};
use tracing::debug;

pub struct Ec2SubnetDirectory {
    client: Client,
}

impl Ec2SubnetDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self::new(ctx.ec2_client())
    }
}

#[async_trait]
impl SubnetDirectory for Ec2SubnetDirectory {
    async fn describe_subnets(&self, subnet_ids: &[String]) -> Result<Vec<SubnetPlacement>> {
        debug!(subnets = ?subnet_ids, "Describing subnets");

        let response = self
            .client
            .describe_subnets()
            .set_subnet_ids(Some(subnet_ids.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(response
            .subnets()
            .iter()
            .filter_map(|subnet| {
                Some(SubnetPlacement::new(
                    subnet.subnet_id()?,
                    subnet.availability_zone_id()?,
                ))
            })
            .collect())
    }
}
