use crate::config::Config;
use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;

/// Container service of the stage
///
/// A Fargate service on the stage network. The task role carries the
/// read/write grant on the contact-form submissions table, so the service
/// stack deploys after the contact-form stack.
pub fn synthesize(config: &Config, stage: &StageConfig) -> Stack {
    let stage_name = stage.name.as_str();
    let name = naming::service_stack_name(stage_name, &stage.region);
    let network_stack = naming::network_stack_name(stage_name, &stage.region);
    let contact_form_stack = naming::contact_form_stack_name(stage_name, &stage.region);
    let service_name = format!("{}-{}", config.project, stage_name.to_lowercase());

    let template = format!(
        "Description: Container service for the {stage_name} stage
Parameters:
    ContainerImage:
        Type: String
        Default: public.ecr.aws/nginx/nginx:stable-alpine
    DesiredCount:
        Type: Number
        Default: 1
Resources:
    Cluster:
        Type: AWS::ECS::Cluster
        Properties:
            ClusterName: {service_name}
    TaskLogGroup:
        Type: AWS::Logs::LogGroup
        Properties:
            LogGroupName: /ecs/{service_name}
            RetentionInDays: 30
    ExecutionRole:
        Type: AWS::IAM::Role
        Properties:
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          Service:
                              - ecs-tasks.amazonaws.com
                      Action:
                          - sts:AssumeRole
            ManagedPolicyArns:
                - arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy
    TaskRole:
        Type: AWS::IAM::Role
        Properties:
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          Service:
                              - ecs-tasks.amazonaws.com
                      Action:
                          - sts:AssumeRole
            Policies:
                - PolicyName: SubmissionsTablePolicy
                  PolicyDocument:
                      Version: '2012-10-17'
                      Statement:
                          - Effect: Allow
                            Action:
                                - dynamodb:BatchGetItem
                                - dynamodb:BatchWriteItem
                                - dynamodb:ConditionCheckItem
                                - dynamodb:PutItem
                                - dynamodb:DescribeTable
                                - dynamodb:DeleteItem
                                - dynamodb:GetItem
                                - dynamodb:Scan
                                - dynamodb:Query
                                - dynamodb:UpdateItem
                            Resource:
                                Fn::ImportValue: {table_arn_export}
    ServiceSecurityGroup:
        Type: AWS::EC2::SecurityGroup
        Properties:
            GroupDescription: Ingress for the {stage_name} service
            VpcId:
                Fn::ImportValue: {vpc_export}
            SecurityGroupIngress:
                - IpProtocol: tcp
                  FromPort: 80
                  ToPort: 80
                  CidrIp: 0.0.0.0/0
    TaskDefinition:
        Type: AWS::ECS::TaskDefinition
        Properties:
            Family: {service_name}
            Cpu: '256'
            Memory: '512'
            NetworkMode: awsvpc
            RequiresCompatibilities:
                - FARGATE
            ExecutionRoleArn: !GetAtt ExecutionRole.Arn
            TaskRoleArn: !GetAtt TaskRole.Arn
            ContainerDefinitions:
                - Name: app
                  Image: !Ref ContainerImage
                  PortMappings:
                      - ContainerPort: 80
                  Environment:
                      - Name: STAGE
                        Value: {stage_name}
                  LogConfiguration:
                      LogDriver: awslogs
                      Options:
                          awslogs-group: !Ref TaskLogGroup
                          awslogs-region: {region}
                          awslogs-stream-prefix: app
    Service:
        Type: AWS::ECS::Service
        Properties:
            Cluster: !Ref Cluster
            LaunchType: FARGATE
            DesiredCount: !Ref DesiredCount
            TaskDefinition: !Ref TaskDefinition
            NetworkConfiguration:
                AwsvpcConfiguration:
                    AssignPublicIp: ENABLED
                    Subnets: !Split
                        - ','
                        - Fn::ImportValue: {subnets_export}
                    SecurityGroups:
                        - !Ref ServiceSecurityGroup
Outputs:
    ClusterName:
        Value: !Ref Cluster
    ServiceName:
        Value: !GetAtt Service.Name
",
        region = stage.region,
        vpc_export = naming::export_name(&network_stack, "VpcId"),
        subnets_export = naming::export_name(&network_stack, "PublicSubnetIds"),
        table_arn_export = naming::export_name(&contact_form_stack, "SubmissionsTableArn"),
    );

    let mut stack = Stack::new(name, template);
    stack.capabilities = vec!["CAPABILITY_IAM"];
    stack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    #[test]
    fn task_role_reads_the_submissions_table() {
        let config = crate::config::test_support::config("frontend", None);

        let stack = synthesize(
            &config,
            &StageConfig {
                name: StageName::Beta,
                account: "111111111111".into(),
                region: "us-west-2".into(),
                is_production: false,
                domain: None,
            },
        );

        assert_eq!(stack.name, "Betauswest2ServiceStack");
        assert!(stack
            .template
            .contains("Fn::ImportValue: Betauswest2ContactFormStack-SubmissionsTableArn"));
        assert!(stack.capabilities.contains(&"CAPABILITY_IAM"));
    }
}
