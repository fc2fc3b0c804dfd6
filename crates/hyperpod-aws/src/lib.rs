// hyperpod-aws - AWS SDK implementations of the provisioner's collaborators
//
// EC2 answers subnet placement queries; S3 stores the cluster template and
// the SLURM provisioning parameters; SageMaker creates and deletes clusters
// directly when the template is bypassed.

pub mod context;
pub mod ec2;
pub mod error;
pub mod s3;
pub mod sagemaker;

pub use context::AwsContext;
pub use ec2::Ec2SubnetDirectory;
pub use error::{classify_aws_error, AwsError};
pub use s3::S3ArtifactStore;
pub use sagemaker::SageMakerClusterService;
