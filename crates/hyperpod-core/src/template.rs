// CloudFormation template wrapping the cluster resource

use crate::request::ClusterRequest;
use serde_json::{json, Value};

pub const TEMPLATE_KEY: &str = "hyperpod-cluster-template.yaml";
pub const TEMPLATE_CONTENT_TYPE: &str = "text/yaml";

const CLUSTER_RESOURCE: &str = "NewHyperPodCluster";

/// Template with a single `AWS::SageMaker::Cluster` resource and outputs for
/// its ARN and name
pub fn cluster_template(request: &ClusterRequest) -> Value {
    json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Resources": {
            CLUSTER_RESOURCE: {
                "Type": "AWS::SageMaker::Cluster",
                "Properties": request.properties(),
            }
        },
        "Outputs": {
            "HyperPodClusterArn": {
                "Description": "The ARN of the created SageMaker HyperPod cluster",
                "Value": { "Fn::GetAtt": [CLUSTER_RESOURCE, "ClusterArn"] },
            },
            "HyperPodClusterName": {
                "Description": "The name of the created SageMaker HyperPod cluster",
                "Value": { "Ref": CLUSTER_RESOURCE },
            }
        }
    })
}

/// Block-style YAML in insertion order
pub fn render_cluster_template(request: &ClusterRequest) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&cluster_template(request))
}

/// Virtual-hosted URL of the uploaded template
pub fn template_url(bucket: &str) -> String {
    format!("https://{}.s3.amazonaws.com/{}", bucket, TEMPLATE_KEY)
}
