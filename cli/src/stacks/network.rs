use crate::config::Config;
use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;

/// VPC the stage's services run in
///
/// Two public subnets across two AZs, routed through an internet gateway.
/// Beta and prod get distinct CIDR ranges so the networks could be peered
/// later without renumbering.
pub fn synthesize(config: &Config, stage: &StageConfig) -> Stack {
    let stage_name = stage.name.as_str();
    let name = naming::network_stack_name(stage_name, &stage.region);
    let octet = if stage.is_production { 2 } else { 1 };
    let vpc_name = format!("{}-{}", config.project, stage_name.to_lowercase());

    let template = format!(
        "Description: Network for the {stage_name} stage
Resources:
    Vpc:
        Type: AWS::EC2::VPC
        Properties:
            CidrBlock: 10.{octet}.0.0/16
            EnableDnsSupport: true
            EnableDnsHostnames: true
            Tags:
                - Key: Name
                  Value: {vpc_name}
    PublicSubnetA:
        Type: AWS::EC2::Subnet
        Properties:
            VpcId: !Ref Vpc
            CidrBlock: 10.{octet}.0.0/20
            AvailabilityZone: !Select [0, !GetAZs '']
            MapPublicIpOnLaunch: true
    PublicSubnetB:
        Type: AWS::EC2::Subnet
        Properties:
            VpcId: !Ref Vpc
            CidrBlock: 10.{octet}.16.0/20
            AvailabilityZone: !Select [1, !GetAZs '']
            MapPublicIpOnLaunch: true
    InternetGateway:
        Type: AWS::EC2::InternetGateway
    GatewayAttachment:
        Type: AWS::EC2::VPCGatewayAttachment
        Properties:
            VpcId: !Ref Vpc
            InternetGatewayId: !Ref InternetGateway
    PublicRouteTable:
        Type: AWS::EC2::RouteTable
        Properties:
            VpcId: !Ref Vpc
    DefaultRoute:
        Type: AWS::EC2::Route
        DependsOn: GatewayAttachment
        Properties:
            RouteTableId: !Ref PublicRouteTable
            DestinationCidrBlock: 0.0.0.0/0
            GatewayId: !Ref InternetGateway
    PublicSubnetARouteTableAssociation:
        Type: AWS::EC2::SubnetRouteTableAssociation
        Properties:
            SubnetId: !Ref PublicSubnetA
            RouteTableId: !Ref PublicRouteTable
    PublicSubnetBRouteTableAssociation:
        Type: AWS::EC2::SubnetRouteTableAssociation
        Properties:
            SubnetId: !Ref PublicSubnetB
            RouteTableId: !Ref PublicRouteTable
Outputs:
    VpcId:
        Value: !Ref Vpc
        Export:
            Name: {vpc_export}
    PublicSubnetIds:
        Value: !Join [',', [!Ref PublicSubnetA, !Ref PublicSubnetB]]
        Export:
            Name: {subnets_export}
",
        vpc_export = naming::export_name(&name, "VpcId"),
        subnets_export = naming::export_name(&name, "PublicSubnetIds"),
    );

    Stack::new(name, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    fn stage(name: StageName) -> StageConfig {
        StageConfig {
            name,
            account: "111111111111".into(),
            region: "us-west-2".into(),
            is_production: name == StageName::Prod,
            domain: None,
        }
    }

    #[test]
    fn stages_get_distinct_cidr_ranges() {
        let config = crate::config::test_support::config("frontend", None);
        let beta = synthesize(&config, &stage(StageName::Beta));
        let prod = synthesize(&config, &stage(StageName::Prod));

        assert!(beta.template.contains("CidrBlock: 10.1.0.0/16"));
        assert!(prod.template.contains("CidrBlock: 10.2.0.0/16"));
    }
}
